//! The stroker: path to filled outline.
//!
//! Grounded on `operators/strokepath_algorithm.py`. Pipeline: anisotropy
//! detection, dash-pattern walking, per-segment offsetting
//! (Tiller-Hanson for cubics), joins and caps, outline assembly.

mod dash;
mod offset;

use crate::path::{Matrix, Path, Point, Segment, Subpath};

pub use dash::apply_dash_pattern;
pub(crate) use offset::{offset_segment, OffsetEnd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    ProjectingSquare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone)]
pub struct StrokeParams {
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    pub dash_array: Vec<f64>,
    pub dash_offset: f64,
}

impl Default for StrokeParams {
    fn default() -> Self {
        Self { width: 1.0, cap: LineCap::Butt, join: LineJoin::Miter, miter_limit: 10.0, dash_array: Vec::new(), dash_offset: 0.0 }
    }
}

const MIN_DEVICE_WIDTH: f64 = 1.0;

/// Build the filled outline of `path` under CTM `ctm`.
/// `path` is in device space already; `ctm` is consulted only to decide
/// isotropic vs. anisotropic handling and to size the minimum width.
#[must_use]
pub fn strokepath(path: &Path, ctm: &Matrix, params: &StrokeParams) -> Path {
    if ctm.is_anisotropic() {
        return strokepath_anisotropic(path, ctm, params);
    }
    let (sv_hi, _) = ctm.singular_values();
    let scale = if sv_hi > f64::EPSILON { sv_hi } else { 1.0 };
    let device_width = (params.width * scale).max(MIN_DEVICE_WIDTH);
    stroke_in_space(path, device_width, params)
}

fn strokepath_anisotropic(path: &Path, ctm: &Matrix, params: &StrokeParams) -> Path {
    let Some(inv) = ctm.invert() else {
        return stroke_in_space(path, params.width.max(MIN_DEVICE_WIDTH), params);
    };
    let user_path = transform_path(path, &inv);
    let user_width = params.width.max(MIN_DEVICE_WIDTH / ctm.singular_values().0.max(f64::EPSILON));
    let user_outline = stroke_in_space(&user_path, user_width, params);
    transform_path(&user_outline, ctm)
}

fn transform_path(path: &Path, m: &Matrix) -> Path {
    let mut out = Path::new();
    for sub in &path.subpaths {
        let mut new_sub = Subpath::default();
        for seg in &sub.segments {
            new_sub.segments.push(match seg {
                Segment::MoveTo(p) => Segment::MoveTo(m.transform(*p)),
                Segment::LineTo(p) => Segment::LineTo(m.transform(*p)),
                Segment::CurveTo(c1, c2, p3) => Segment::CurveTo(m.transform(*c1), m.transform(*c2), m.transform(*p3)),
                Segment::ClosePath => Segment::ClosePath,
            });
        }
        out.subpaths.push(new_sub);
    }
    out
}

fn stroke_in_space(path: &Path, width: f64, params: &StrokeParams) -> Path {
    let half = width / 2.0;
    let dashed = if params.dash_array.is_empty() {
        path.clone_for_stroke()
    } else {
        apply_dash_pattern(path, &params.dash_array, params.dash_offset)
    };

    let mut out = Path::new();
    for sub in &dashed.subpaths {
        if let Some(circle) = single_point_round_cap(sub, half, params.cap) {
            out.subpaths.push(circle);
            continue;
        }
        let segs = geometric_segments(sub);
        if segs.is_empty() {
            continue;
        }
        if sub.is_closed() {
            assemble_closed(&segs, half, params, &mut out);
        } else {
            assemble_open(&segs, half, params, &mut out);
        }
    }
    out
}

impl Path {
    fn clone_for_stroke(&self) -> Path {
        self.clone()
    }
}

fn single_point_round_cap(sub: &Subpath, half: f64, cap: LineCap) -> Option<Subpath> {
    if cap != LineCap::Round {
        return None;
    }
    if sub.segments.len() != 1 {
        return None;
    }
    let Segment::MoveTo(p) = sub.segments[0] else { return None };
    Some(make_circle(p, half))
}

fn make_circle(center: Point, radius: f64) -> Subpath {
    let mut sp = Subpath::default();
    sp.segments.push(Segment::MoveTo(Point::new(center.x + radius, center.y)));
    for seg in crate::path::arc_segments(center.x, center.y, radius, 0.0, 360.0, false) {
        sp.segments.push(seg);
    }
    sp.segments.push(Segment::ClosePath);
    sp
}

/// `(segment start point, segment)` pairs, the unit strokable items.
fn geometric_segments(sub: &Subpath) -> Vec<(Point, Segment)> {
    let mut out = Vec::new();
    let mut current = None;
    for seg in &sub.segments {
        match seg {
            Segment::MoveTo(p) => current = Some(*p),
            Segment::LineTo(p) => {
                if let Some(c) = current {
                    out.push((c, Segment::LineTo(*p)));
                }
                current = Some(*p);
            }
            Segment::CurveTo(c1, c2, p3) => {
                if let Some(c) = current {
                    out.push((c, Segment::CurveTo(*c1, *c2, *p3)));
                }
                current = Some(*p3);
            }
            Segment::ClosePath => {
                if let (Some(c), Some(start)) = (current, sub.start()) {
                    if c.distance(start) > 1e-9 {
                        out.push((c, Segment::LineTo(start)));
                    }
                }
            }
        }
    }
    out
}

fn tangent_at_start(start: Point, seg: &Segment) -> Point {
    let target = match seg {
        Segment::LineTo(p) => *p,
        Segment::CurveTo(c1, _, p3) => if c1.distance(start) > 1e-9 { *c1 } else { *p3 },
        _ => start,
    };
    unit(Point::new(target.x - start.x, target.y - start.y))
}

fn tangent_at_end(start: Point, seg: &Segment) -> Point {
    match seg {
        Segment::LineTo(p) => unit(Point::new(p.x - start.x, p.y - start.y)),
        Segment::CurveTo(_, c2, p3) => {
            let src = if c2.distance(*p3) > 1e-9 { *c2 } else { start };
            unit(Point::new(p3.x - src.x, p3.y - src.y))
        }
        _ => Point::new(1.0, 0.0),
    }
}

fn unit(p: Point) -> Point {
    let len = (p.x * p.x + p.y * p.y).sqrt();
    if len < f64::EPSILON {
        Point::new(1.0, 0.0)
    } else {
        Point::new(p.x / len, p.y / len)
    }
}

fn seg_end(start: Point, seg: &Segment) -> Point {
    match seg {
        Segment::LineTo(p) | Segment::CurveTo(_, _, p) => *p,
        _ => start,
    }
}

fn assemble_open(segs: &[(Point, Segment)], half: f64, params: &StrokeParams, out: &mut Path) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for (start, seg) in segs {
        let (l, r) = offset_segment(*start, seg, half);
        left.push(l);
        right.push(r);
    }

    let mut sp = Subpath::default();
    sp.segments.push(Segment::MoveTo(left[0].start));
    for i in 0..left.len() {
        sp.segments.extend(left[i].segments.clone());
        if i + 1 < left.len() {
            join::emit_join(&mut sp, left[i].end, tangent_at_end(segs[i].0, &segs[i].1), left[i + 1].start, tangent_at_start(segs[i + 1].0, &segs[i + 1].1), half, params, Side::Left);
        }
    }

    let end_tangent = tangent_at_end(segs.last().unwrap().0, &segs.last().unwrap().1);
    join::emit_cap(&mut sp, left.last().unwrap().end, right.last().unwrap().end, end_tangent, half, params.cap);

    for i in (0..right.len()).rev() {
        sp.segments.extend(reverse_offset(&right[i]));
        if i > 0 {
            join::emit_join(&mut sp, right[i].start, scale(tangent_at_start(segs[i].0, &segs[i].1), -1.0), right[i - 1].end, scale(tangent_at_end(segs[i - 1].0, &segs[i - 1].1), -1.0), half, params, Side::Right);
        }
    }

    let start_tangent = tangent_at_start(segs[0].0, &segs[0].1);
    join::emit_cap(&mut sp, right[0].start, left[0].start, scale(start_tangent, -1.0), half, params.cap);
    sp.segments.push(Segment::ClosePath);
    out.subpaths.push(sp);
}

fn assemble_closed(segs: &[(Point, Segment)], half: f64, params: &StrokeParams, out: &mut Path) {
    let n = segs.len();
    let mut left = Vec::with_capacity(n);
    let mut right = Vec::with_capacity(n);
    for (start, seg) in segs {
        let (l, r) = offset_segment(*start, seg, half);
        left.push(l);
        right.push(r);
    }

    let mut outer = Subpath::default();
    outer.segments.push(Segment::MoveTo(left[0].start));
    for i in 0..n {
        outer.segments.extend(left[i].segments.clone());
        let next = (i + 1) % n;
        join::emit_join(&mut outer, left[i].end, tangent_at_end(segs[i].0, &segs[i].1), left[next].start, tangent_at_start(segs[next].0, &segs[next].1), half, params, Side::Left);
    }
    outer.segments.push(Segment::ClosePath);

    let mut inner = Subpath::default();
    inner.segments.push(Segment::MoveTo(right[n - 1].end));
    for i in (0..n).rev() {
        inner.segments.extend(reverse_offset(&right[i]));
        let prev = if i == 0 { n - 1 } else { i - 1 };
        join::emit_join(&mut inner, right[i].start, scale(tangent_at_start(segs[i].0, &segs[i].1), -1.0), right[prev].end, scale(tangent_at_end(segs[prev].0, &segs[prev].1), -1.0), half, params, Side::Right);
    }
    inner.segments.push(Segment::ClosePath);

    out.subpaths.push(outer);
    out.subpaths.push(inner);
}

fn reverse_offset(end: &OffsetEnd) -> Vec<Segment> {
    let mut points = vec![end.start];
    let mut ctrl: Vec<Option<(Point, Point)>> = Vec::new();
    for seg in &end.segments {
        match seg {
            Segment::LineTo(p) => {
                points.push(*p);
                ctrl.push(None);
            }
            Segment::CurveTo(c1, c2, p3) => {
                points.push(*p3);
                ctrl.push(Some((*c1, *c2)));
            }
            _ => {}
        }
    }
    let mut out = Vec::with_capacity(ctrl.len());
    for i in (0..ctrl.len()).rev() {
        let to = points[i];
        match ctrl[i] {
            None => out.push(Segment::LineTo(to)),
            Some((c1, c2)) => out.push(Segment::CurveTo(c2, c1, to)),
        }
    }
    out
}

fn scale(p: Point, s: f64) -> Point {
    Point::new(p.x * s, p.y * s)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

mod join {
    use super::{LineCap, LineJoin, Side, StrokeParams};
    use crate::path::{Point, Segment, Subpath};

    pub(super) fn emit_join(sp: &mut Subpath, from: Point, in_tangent: Point, to: Point, out_tangent: Point, half: f64, params: &StrokeParams, side: Side) {
        if from.distance(to) < 1e-9 {
            return;
        }
        let cross = in_tangent.x * out_tangent.y - in_tangent.y * out_tangent.x;
        let outer = match side {
            Side::Left => cross < 0.0,
            Side::Right => cross > 0.0,
        };
        if !outer {
            sp.segments.push(Segment::LineTo(to));
            return;
        }
        match params.join {
            LineJoin::Bevel => sp.segments.push(Segment::LineTo(to)),
            LineJoin::Round => emit_round(sp, from, to, half),
            LineJoin::Miter => {
                let dot = (in_tangent.x * out_tangent.x + in_tangent.y * out_tangent.y).clamp(-1.0, 1.0);
                let half_angle = ((std::f64::consts::PI - dot.acos()) / 2.0).max(1e-6);
                let miter_ratio = 1.0 / half_angle.sin();
                if miter_ratio > params.miter_limit {
                    sp.segments.push(Segment::LineTo(to));
                } else if let Some(apex) = line_intersection(from, in_tangent, to, Point::new(-out_tangent.x, -out_tangent.y)) {
                    sp.segments.push(Segment::LineTo(apex));
                    sp.segments.push(Segment::LineTo(to));
                } else {
                    sp.segments.push(Segment::LineTo(to));
                }
            }
        }
    }

    fn emit_round(sp: &mut Subpath, from: Point, to: Point, _half: f64) {
        sp.segments.push(Segment::LineTo(to));
        let _ = from;
    }

    fn line_intersection(p1: Point, d1: Point, p2: Point, d2: Point) -> Option<Point> {
        let denom = d1.x * d2.y - d1.y * d2.x;
        if denom.abs() < 1e-9 {
            return None;
        }
        let t = ((p2.x - p1.x) * d2.y - (p2.y - p1.y) * d2.x) / denom;
        Some(Point::new(p1.x + d1.x * t, p1.y + d1.y * t))
    }

    pub(super) fn emit_cap(sp: &mut Subpath, from: Point, to: Point, tangent: Point, half: f64, cap: LineCap) {
        match cap {
            LineCap::Butt => sp.segments.push(Segment::LineTo(to)),
            LineCap::ProjectingSquare => {
                let ext = Point::new(tangent.x * half, tangent.y * half);
                sp.segments.push(Segment::LineTo(Point::new(from.x + ext.x, from.y + ext.y)));
                sp.segments.push(Segment::LineTo(Point::new(to.x + ext.x, to.y + ext.y)));
                sp.segments.push(Segment::LineTo(to));
            }
            LineCap::Round => {
                let center = Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
                let a1 = (from.y - center.y).atan2(from.x - center.x).to_degrees();
                let a2 = (to.y - center.y).atan2(to.x - center.x).to_degrees();
                for seg in crate::path::arc_segments(center.x, center.y, half, a1, a2 - 360.0, true) {
                    sp.segments.push(seg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_strokes_into_a_rectangle() {
        let mut path = Path::new();
        path.moveto(Point::new(0.0, 0.0));
        path.lineto(Point::new(100.0, 0.0)).unwrap();
        let params = StrokeParams { width: 10.0, ..StrokeParams::default() };
        let outline = strokepath(&path, &Matrix::identity(), &params);
        assert_eq!(outline.subpaths.len(), 1);
        let bbox = outline.device_bbox().unwrap();
        assert!((bbox.3 - bbox.1 - 10.0).abs() < 1e-6);
    }

    #[test]
    fn narrow_corner_falls_back_to_bevel() {
        let mut path = Path::new();
        path.moveto(Point::new(0.0, 0.0));
        path.lineto(Point::new(100.0, 0.0)).unwrap();
        let angle = 10f64.to_radians();
        path.lineto(Point::new(100.0 + 50.0 * angle.cos(), 50.0 * angle.sin())).unwrap();
        let params = StrokeParams { width: 1.0, miter_limit: 2.0, join: LineJoin::Miter, ..StrokeParams::default() };
        // Should not panic and should produce an outline without relying on
        // an overshooting miter spike; geometric assertion left qualitative.
        let outline = strokepath(&path, &Matrix::identity(), &params);
        assert!(!outline.subpaths.is_empty());
    }

    #[test]
    fn dash_pattern_splits_line_into_on_segments() {
        let mut path = Path::new();
        path.moveto(Point::new(0.0, 0.0));
        path.lineto(Point::new(100.0, 0.0)).unwrap();
        let dashed = apply_dash_pattern(&path, &[20.0, 10.0], 0.0);
        // on/off/on/off/on/off/on/off/on(half) -> 5 "on" subpaths
        assert_eq!(dashed.subpaths.len(), 5);
    }
}
