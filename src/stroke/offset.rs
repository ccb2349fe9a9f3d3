//! Per-segment offsetting: lines offset by their unit normal, cubics by
//! adaptive Tiller-Hanson control-point displacement.
//!
//! Grounded on `operators/strokepath_algorithm.py`'s `offset_segment` /
//! `_offset_cubic_recursive_raw`.

use crate::path::{split_cubic, Point, Segment};

/// One offset side of a geometric segment: where it starts, the segments
/// to append (relative to that start), and where it ends.
#[derive(Debug, Clone)]
pub(crate) struct OffsetEnd {
    pub start: Point,
    pub end: Point,
    pub segments: Vec<Segment>,
}

const MAX_OFFSET_DEPTH: u32 = 10;
const NORMAL_DOT_THRESHOLD: f64 = 0.966;

fn normal(from: Point, to: Point) -> Point {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < f64::EPSILON {
        return Point::new(0.0, 0.0);
    }
    Point::new(-dy / len, dx / len)
}

fn offset_point(p: Point, n: Point, dist: f64) -> Point {
    Point::new(p.x + n.x * dist, p.y + n.y * dist)
}

/// Returns `(left offset at +dist, right offset at -dist)`.
pub(crate) fn offset_segment(start: Point, seg: &Segment, half_width: f64) -> (OffsetEnd, OffsetEnd) {
    match seg {
        Segment::LineTo(p) => {
            let n = normal(start, *p);
            let l_start = offset_point(start, n, half_width);
            let l_end = offset_point(*p, n, half_width);
            let r_start = offset_point(start, n, -half_width);
            let r_end = offset_point(*p, n, -half_width);
            (
                OffsetEnd { start: l_start, end: l_end, segments: vec![Segment::LineTo(l_end)] },
                OffsetEnd { start: r_start, end: r_end, segments: vec![Segment::LineTo(r_end)] },
            )
        }
        Segment::CurveTo(c1, c2, p3) => {
            let mut left = Vec::new();
            let mut right = Vec::new();
            offset_cubic_recursive(start, *c1, *c2, *p3, half_width, 0, &mut left, &mut right);
            let n0 = normal(start, if c1.distance(start) > 1e-9 { *c1 } else { *p3 });
            let n3 = normal(if c2.distance(*p3) > 1e-9 { *c2 } else { start }, *p3);
            let l_start = offset_point(start, n0, half_width);
            let l_end = offset_point(*p3, n3, half_width);
            let r_start = offset_point(start, n0, -half_width);
            let r_end = offset_point(*p3, n3, -half_width);
            (
                OffsetEnd { start: l_start, end: l_end, segments: left },
                OffsetEnd { start: r_start, end: r_end, segments: right },
            )
        }
        _ => (
            OffsetEnd { start, end: start, segments: vec![] },
            OffsetEnd { start, end: start, segments: vec![] },
        ),
    }
}

fn perp_distance(p: Point, a: Point, b: Point) -> f64 {
    let len = a.distance(b);
    if len < f64::EPSILON {
        return p.distance(a);
    }
    ((b.x - a.x) * (a.y - p.y) - (a.x - p.x) * (b.y - a.y)).abs() / len
}

fn dist(a: Point, b: Point) -> f64 {
    a.distance(b)
}

fn offset_cubic_recursive(p0: Point, p1: Point, p2: Point, p3: Point, half_width: f64, depth: u32, left: &mut Vec<Segment>, right: &mut Vec<Segment>) {
    let chord = dist(p0, p3);
    // Degenerate, near-zero-length curves degrade to lines.
    if chord < (half_width * 0.1).max(1e-6) && depth > 0 {
        push_line_offset(p0, p3, half_width, left, right);
        return;
    }

    let n0 = normal(p0, if dist(p0, p1) > 1e-9 { p1 } else { p3 });
    let n3 = normal(if dist(p2, p3) > 1e-9 { p2 } else { p0 }, p3);
    let dot = (n0.x * n3.x + n0.y * n3.y).clamp(-1.0, 1.0);

    let flat = depth >= MAX_OFFSET_DEPTH
        || (perp_distance(p1, p0, p3) < 0.1
            && perp_distance(p2, p0, p3) < 0.1
            && (dot > NORMAL_DOT_THRESHOLD)
            && (chord * (1.0 - dot)).abs() <= 0.1);

    if flat {
        let l1 = offset_point(p1, n0, half_width);
        let l2 = offset_point(p2, n3, half_width);
        let l3 = offset_point(p3, n3, half_width);
        left.push(Segment::CurveTo(l1, l2, l3));

        let r1 = offset_point(p1, n0, -half_width);
        let r2 = offset_point(p2, n3, -half_width);
        let r3 = offset_point(p3, n3, -half_width);
        right.push(Segment::CurveTo(r1, r2, r3));
        return;
    }

    let (lo, hi) = split_cubic(p0, p1, p2, p3, 0.5);
    offset_cubic_recursive(lo.0, lo.1, lo.2, lo.3, half_width, depth + 1, left, right);
    offset_cubic_recursive(hi.0, hi.1, hi.2, hi.3, half_width, depth + 1, left, right);
}

fn push_line_offset(p0: Point, p1: Point, half_width: f64, left: &mut Vec<Segment>, right: &mut Vec<Segment>) {
    let n = normal(p0, p1);
    left.push(Segment::LineTo(offset_point(p1, n, half_width)));
    right.push(Segment::LineTo(offset_point(p1, n, -half_width)));
}
