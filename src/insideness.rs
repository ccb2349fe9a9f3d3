//! Point-in-path tests: `infill`, `ineofill`, `instroke`.
//!
//! Grounded on `operators/insideness.py`. The path is flattened on the
//! fly; a horizontal ray is cast towards +x and each non-horizontal
//! segment with exactly one endpoint strictly below the query point
//! is counted.

use crate::path::{Matrix, Path, Point, Segment};
use crate::stroke::{strokepath, StrokeParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

fn polyline_segments(path: &Path, flatness: f64) -> Vec<(Point, Point)> {
    let flat = path.flatten(flatness);
    let mut out = Vec::new();
    for sub in &flat.subpaths {
        let mut current = None;
        let mut start = None;
        for seg in &sub.segments {
            match seg {
                Segment::MoveTo(p) => {
                    current = Some(*p);
                    start = Some(*p);
                }
                Segment::LineTo(p) => {
                    if let Some(c) = current {
                        out.push((c, *p));
                    }
                    current = Some(*p);
                }
                Segment::ClosePath => {
                    if let (Some(c), Some(s)) = (current, start) {
                        if c.distance(s) > 1e-9 {
                            out.push((c, s));
                        }
                    }
                    current = start;
                }
                Segment::CurveTo(..) => unreachable!("flatten removes all curves"),
            }
        }
    }
    out
}

fn winding_number(point: Point, segments: &[(Point, Point)]) -> i32 {
    let mut winding = 0;
    for (a, b) in segments {
        if (a.y > point.y) == (b.y > point.y) {
            continue; // both endpoints on the same side, or horizontal
        }
        // x coordinate where the segment crosses y = point.y
        let t = (point.y - a.y) / (b.y - a.y);
        let x_cross = a.x + t * (b.x - a.x);
        if x_cross <= point.x {
            continue;
        }
        winding += if b.y > a.y { 1 } else { -1 };
    }
    winding
}

fn crossing_count(point: Point, segments: &[(Point, Point)]) -> u32 {
    let mut crossings = 0;
    for (a, b) in segments {
        if (a.y > point.y) == (b.y > point.y) {
            continue;
        }
        let t = (point.y - a.y) / (b.y - a.y);
        let x_cross = a.x + t * (b.x - a.x);
        if x_cross > point.x {
            crossings += 1;
        }
    }
    crossings
}

fn test(path: &Path, point: Point, rule: FillRule, flatness: f64) -> bool {
    let segments = polyline_segments(path, flatness);
    match rule {
        FillRule::NonZero => winding_number(point, &segments) != 0,
        FillRule::EvenOdd => crossing_count(point, &segments) % 2 == 1,
    }
}

/// `infill`: nonzero-rule point-in-path test.
#[must_use]
pub fn infill(path: &Path, point: Point, flatness: f64) -> bool {
    test(path, point, FillRule::NonZero, flatness)
}

/// `ineofill`: even-odd-rule point-in-path test.
#[must_use]
pub fn ineofill(path: &Path, point: Point, flatness: f64) -> bool {
    test(path, point, FillRule::EvenOdd, flatness)
}

/// `instroke`: build the stroke outline without mutating the current
/// path, then apply the nonzero test.
#[must_use]
pub fn instroke(path: &Path, point: Point, ctm: &Matrix, params: &StrokeParams, flatness: f64) -> bool {
    let outline = strokepath(path, ctm, params);
    test(&outline, point, FillRule::NonZero, flatness)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Path {
        let mut p = Path::new();
        p.moveto(Point::new(0.0, 0.0));
        p.lineto(Point::new(10.0, 0.0)).unwrap();
        p.lineto(Point::new(10.0, 10.0)).unwrap();
        p.lineto(Point::new(0.0, 10.0)).unwrap();
        p.closepath();
        p
    }

    #[test]
    fn point_inside_square_is_inside() {
        assert!(infill(&square(), Point::new(5.0, 5.0), 0.1));
    }

    #[test]
    fn point_outside_square_is_outside() {
        assert!(!infill(&square(), Point::new(50.0, 50.0), 0.1));
        assert!(!ineofill(&square(), Point::new(50.0, 50.0), 0.1));
    }

    #[test]
    fn point_on_edge_nonzero_matches_evenodd() {
        let p = square();
        let pt = Point::new(5.0, 5.0);
        assert_eq!(infill(&p, pt, 0.1), ineofill(&p, pt, 0.1));
    }
}
