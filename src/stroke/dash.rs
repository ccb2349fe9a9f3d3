//! Dash-pattern walking: split each subpath's geometry at dash-array
//! boundaries measured along its arc length.
//!
//! Grounded on `operators/strokepath_algorithm.py`'s `apply_dash_pattern`
//! and `_find_cubic_t_for_length`.

use crate::path::{split_cubic, Path, Point, Segment, Subpath};

#[derive(Debug, Clone, Copy)]
enum Geom {
    Line(Point, Point),
    Cubic(Point, Point, Point, Point),
}

impl Geom {
    fn start(&self) -> Point {
        match *self {
            Geom::Line(a, _) => a,
            Geom::Cubic(p0, ..) => p0,
        }
    }

    fn to_segment(self) -> Segment {
        match self {
            Geom::Line(_, b) => Segment::LineTo(b),
            Geom::Cubic(_, p1, p2, p3) => Segment::CurveTo(p1, p2, p3),
        }
    }

    fn length(&self) -> f64 {
        match *self {
            Geom::Line(a, b) => a.distance(b),
            Geom::Cubic(p0, p1, p2, p3) => cubic_arc_length(p0, p1, p2, p3, 0),
        }
    }

    /// Split off the first `target` units of arc length. Returns the
    /// consumed segment and the remaining geometry.
    fn split_at_length(&self, target: f64) -> (Segment, Geom) {
        match *self {
            Geom::Line(a, b) => {
                let len = a.distance(b);
                let t = if len < f64::EPSILON { 0.0 } else { (target / len).clamp(0.0, 1.0) };
                let mid = Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
                (Segment::LineTo(mid), Geom::Line(mid, b))
            }
            Geom::Cubic(p0, p1, p2, p3) => {
                let t = find_t_for_length(p0, p1, p2, p3, target);
                let (lo, hi) = split_cubic(p0, p1, p2, p3, t);
                (Segment::CurveTo(lo.1, lo.2, lo.3), Geom::Cubic(hi.0, hi.1, hi.2, hi.3))
            }
        }
    }
}

fn cubic_arc_length(p0: Point, p1: Point, p2: Point, p3: Point, depth: u32) -> f64 {
    let chord = p0.distance(p3);
    let poly = p0.distance(p1) + p1.distance(p2) + p2.distance(p3);
    if depth >= 24 || (poly - chord).abs() < 0.1 {
        return (chord + poly) / 2.0;
    }
    let (lo, hi) = split_cubic(p0, p1, p2, p3, 0.5);
    cubic_arc_length(lo.0, lo.1, lo.2, lo.3, depth + 1) + cubic_arc_length(hi.0, hi.1, hi.2, hi.3, depth + 1)
}

fn find_t_for_length(p0: Point, p1: Point, p2: Point, p3: Point, target: f64) -> f64 {
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    for _ in 0..20 {
        let mid = (lo + hi) / 2.0;
        let (a, _) = split_cubic(p0, p1, p2, p3, mid);
        if cubic_arc_length(a.0, a.1, a.2, a.3, 0) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

fn normalize_dashes(dash_array: &[f64]) -> Vec<f64> {
    let mut dashes: Vec<f64> = dash_array.iter().copied().filter(|d| *d >= 0.0).collect();
    if dashes.len() % 2 == 1 {
        let doubled = dashes.clone();
        dashes.extend(doubled);
    }
    dashes
}

fn initial_state(dash_offset: f64, dashes: &[f64], cycle: f64) -> (usize, f64) {
    let mut pos = dash_offset.rem_euclid(cycle);
    let mut idx = 0;
    loop {
        if pos < dashes[idx] || idx == dashes.len() - 1 {
            return (idx, dashes[idx] - pos);
        }
        pos -= dashes[idx];
        idx += 1;
    }
}

/// `(geometry start point, segment)` items making up one subpath, as in
/// `stroke::mod`'s `geometric_segments` (duplicated here to keep this
/// module independent of private helpers shaped for offsetting).
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

/// Walk every subpath of `path`, splitting it into "on" dash subpaths.
#[must_use]
pub fn apply_dash_pattern(path: &Path, dash_array: &[f64], dash_offset: f64) -> Path {
    let dashes = normalize_dashes(dash_array);
    let cycle: f64 = dashes.iter().sum();
    if dashes.is_empty() || cycle <= 1e-9 {
        return path.clone();
    }

    let mut out = Path::new();
    for sub in &path.subpaths {
        let segs = geometric_segments(sub);
        if segs.is_empty() {
            continue;
        }
        let closed = sub.is_closed();
        let (mut idx, mut remaining) = initial_state(dash_offset, &dashes, cycle);
        let mut is_on = idx % 2 == 0;

        let mut produced: Vec<Subpath> = Vec::new();
        let mut current: Option<Subpath> = None;
        if is_on {
            let mut s = Subpath::default();
            s.segments.push(Segment::MoveTo(segs[0].0));
            current = Some(s);
        }

        for (start, seg) in &segs {
            let mut geom = match seg {
                Segment::LineTo(p) => Geom::Line(*start, *p),
                Segment::CurveTo(c1, c2, p3) => Geom::Cubic(*start, *c1, *c2, *p3),
                _ => continue,
            };
            loop {
                let len = geom.length();
                if remaining >= len - 1e-9 {
                    if is_on {
                        let seg_out = geom.to_segment();
                        current.get_or_insert_with(|| {
                            let mut s = Subpath::default();
                            s.segments.push(Segment::MoveTo(geom.start()));
                            s
                        });
                        current.as_mut().unwrap().segments.push(seg_out);
                    }
                    remaining -= len;
                    break;
                }
                let (consumed, rest) = geom.split_at_length(remaining);
                if is_on {
                    current.get_or_insert_with(|| {
                        let mut s = Subpath::default();
                        s.segments.push(Segment::MoveTo(geom.start()));
                        s
                    });
                    current.as_mut().unwrap().segments.push(consumed);
                    produced.push(current.take().unwrap());
                }
                idx = (idx + 1) % dashes.len();
                is_on = idx % 2 == 0;
                remaining = dashes[idx];
                if is_on {
                    let mut s = Subpath::default();
                    s.segments.push(Segment::MoveTo(rest.start()));
                    current = Some(s);
                }
                geom = rest;
            }
        }
        if let Some(s) = current.take() {
            produced.push(s);
        }

        if closed && produced.len() > 1 {
            let first_touches_start = produced.first().and_then(Subpath::start) == segs.first().map(|(p, _)| *p);
            let last_ends_at_start = produced.last().and_then(|s| s.end_point()) == segs.first().map(|(p, _)| *p);
            if first_touches_start && last_ends_at_start {
                let first = produced.remove(0);
                if let Some(last) = produced.last_mut() {
                    last.segments.extend(first.segments.into_iter().skip(1));
                } else {
                    produced.push(first);
                }
            }
        }

        out.subpaths.extend(produced);
    }
    out
}
