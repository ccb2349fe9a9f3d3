//! Path construction: moves, lines, curves, arc synthesis, flattening,
//! bounding boxes, and the affine matrix that carries user space into
//! device space.
//!
//! Grounded on `operators/path.py` and `core/matrix.py`. Paths in the
//! graphics state are stored in device space (the CTM is already
//! baked in at construction time), matching the source.

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A 2x3 affine transform, `[a b c d e f]` in PLRM order:
/// `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    #[must_use]
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    #[must_use]
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: tx, f: ty }
    }

    #[must_use]
    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self { a: sx, b: 0.0, c: 0.0, d: sy, e: 0.0, f: 0.0 }
    }

    #[must_use]
    pub fn rotation(degrees: f64) -> Self {
        let r = degrees.to_radians();
        Self { a: r.cos(), b: r.sin(), c: -r.sin(), d: r.cos(), e: 0.0, f: 0.0 }
    }

    /// PLRM `concat`: apply `self` then `other`.
    #[must_use]
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    #[must_use]
    pub fn transform(&self, p: Point) -> Point {
        Point { x: self.a * p.x + self.c * p.y + self.e, y: self.b * p.x + self.d * p.y + self.f }
    }

    /// Transforms a displacement, ignoring translation (`dtransform`).
    #[must_use]
    pub fn transform_delta(&self, p: Point) -> Point {
        Point { x: self.a * p.x + self.c * p.y, y: self.b * p.x + self.d * p.y }
    }

    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    #[must_use]
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = self.d * inv_det;
        let b = -self.b * inv_det;
        let c = -self.c * inv_det;
        let d = self.a * inv_det;
        let e = -(self.e * a + self.f * c);
        let f = -(self.e * b + self.f * d);
        Some(Matrix { a, b, c, d, e, f })
    }

    /// Singular values of the linear part, largest first. Used to detect
    /// anisotropic scaling before stroking.
    #[must_use]
    pub fn singular_values(&self) -> (f64, f64) {
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        let e = (a * a + b * b + c * c + d * d) / 2.0;
        let f = (((a * a + b * b - c * c - d * d) / 2.0).powi(2) + (a * c + b * d).powi(2)).sqrt();
        let hi = (e + f).max(0.0).sqrt();
        let lo = (e - f).max(0.0).sqrt();
        (hi, lo)
    }

    /// True if scaling differs enough by axis that stroking should happen
    /// in user space instead of device space (axis ratio above 1.01).
    #[must_use]
    pub fn is_anisotropic(&self) -> bool {
        let (hi, lo) = self.singular_values();
        if lo <= f64::EPSILON {
            return hi > f64::EPSILON;
        }
        hi / lo > 1.01
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    MoveTo(Point),
    LineTo(Point),
    CurveTo(Point, Point, Point),
    ClosePath,
}

/// One subpath: always begins with `MoveTo`; `ClosePath` is terminal.
#[derive(Debug, Clone, Default)]
pub struct Subpath {
    pub segments: Vec<Segment>,
}

impl Subpath {
    #[must_use]
    pub fn start(&self) -> Option<Point> {
        match self.segments.first() {
            Some(Segment::MoveTo(p)) => Some(*p),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::ClosePath))
    }

    /// The point a freshly appended segment would start from.
    #[must_use]
    pub fn end_point(&self) -> Option<Point> {
        for seg in self.segments.iter().rev() {
            match seg {
                Segment::MoveTo(p) | Segment::LineTo(p) => return Some(*p),
                Segment::CurveTo(_, _, p3) => return Some(*p3),
                Segment::ClosePath => return self.start(),
            }
        }
        None
    }

    #[must_use]
    pub fn reversed(&self) -> Subpath {
        let Some(start) = self.start() else { return Subpath::default() };
        let closed = self.is_closed();
        // Collect endpoints of every drawing segment (skipping the
        // leading MoveTo and a trailing ClosePath) to walk them backwards.
        let mut points = vec![start];
        let mut curves: Vec<Option<(Point, Point)>> = Vec::new();
        for seg in &self.segments {
            match seg {
                Segment::MoveTo(_) => {}
                Segment::LineTo(p) => {
                    points.push(*p);
                    curves.push(None);
                }
                Segment::CurveTo(c1, c2, p3) => {
                    points.push(*p3);
                    curves.push(Some((*c1, *c2)));
                }
                Segment::ClosePath => {}
            }
        }
        let mut out = Subpath::default();
        let last = *points.last().unwrap_or(&start);
        out.segments.push(Segment::MoveTo(last));
        for i in (0..curves.len()).rev() {
            let from_to = points[i];
            match curves[i] {
                None => out.segments.push(Segment::LineTo(from_to)),
                Some((c1, c2)) => out.segments.push(Segment::CurveTo(c2, c1, from_to)),
            }
        }
        if closed {
            out.segments.push(Segment::ClosePath);
        }
        out
    }
}

/// An ordered sequence of subpaths, device-space coordinates.
#[derive(Debug, Clone, Default)]
pub struct Path {
    pub subpaths: Vec<Subpath>,
    /// Set by `setbbox`; verbatim user-space rectangle overriding the
    /// computed bbox until the next `newpath`.
    pub user_bbox: Option<(f64, f64, f64, f64)>,
}

impl Path {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subpaths.is_empty()
    }

    #[must_use]
    pub fn current_point(&self) -> Option<Point> {
        self.subpaths.last()?.end_point()
    }

    pub fn moveto(&mut self, p: Point) {
        self.subpaths.push(Subpath { segments: vec![Segment::MoveTo(p)] });
    }

    fn current_subpath_mut(&mut self) -> Result<&mut Subpath, Error> {
        self.subpaths.last_mut().filter(|s| !s.is_closed()).ok_or_else(|| Error::new(ErrorKind::NoCurrentPoint, "path"))
    }

    pub fn lineto(&mut self, p: Point) -> Result<(), Error> {
        self.current_subpath_mut()?.segments.push(Segment::LineTo(p));
        Ok(())
    }

    pub fn curveto(&mut self, c1: Point, c2: Point, p3: Point) -> Result<(), Error> {
        self.current_subpath_mut()?.segments.push(Segment::CurveTo(c1, c2, p3));
        Ok(())
    }

    pub fn closepath(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            if !sub.is_closed() && sub.start().is_some() {
                sub.segments.push(Segment::ClosePath);
            }
        }
    }

    #[must_use]
    pub fn reversepath(&self) -> Path {
        Path { subpaths: self.subpaths.iter().map(Subpath::reversed).collect(), user_bbox: self.user_bbox }
    }

    /// Tight device-space bounding box over control points (a legal,
    /// slightly loose, bbox per PLRM).
    #[must_use]
    pub fn device_bbox(&self) -> Option<(f64, f64, f64, f64)> {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut seen = false;
        let mut visit = |p: Point| {
            seen = true;
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        };
        for sub in &self.subpaths {
            for seg in &sub.segments {
                match seg {
                    Segment::MoveTo(p) | Segment::LineTo(p) => visit(*p),
                    Segment::CurveTo(c1, c2, p3) => {
                        visit(*c1);
                        visit(*c2);
                        visit(*p3);
                    }
                    Segment::ClosePath => {}
                }
            }
        }
        seen.then_some((min_x, min_y, max_x, max_y))
    }

    /// Replace every cubic with a polyline whose maximum perpendicular
    /// deviation from the curve is at most `tolerance`.
    #[must_use]
    pub fn flatten(&self, tolerance: f64) -> Path {
        let mut out = Path { subpaths: Vec::with_capacity(self.subpaths.len()), user_bbox: self.user_bbox };
        for sub in &self.subpaths {
            let mut flat = Subpath::default();
            let mut current = Point::new(0.0, 0.0);
            for seg in &sub.segments {
                match seg {
                    Segment::MoveTo(p) => {
                        current = *p;
                        flat.segments.push(Segment::MoveTo(*p));
                    }
                    Segment::LineTo(p) => {
                        current = *p;
                        flat.segments.push(Segment::LineTo(*p));
                    }
                    Segment::CurveTo(c1, c2, p3) => {
                        let mut pts = Vec::new();
                        flatten_cubic(current, *c1, *c2, *p3, tolerance, 0, &mut pts);
                        for p in pts {
                            flat.segments.push(Segment::LineTo(p));
                        }
                        current = *p3;
                    }
                    Segment::ClosePath => flat.segments.push(Segment::ClosePath),
                }
            }
            out.subpaths.push(flat);
        }
        out
    }
}

const MAX_FLATTEN_DEPTH: u32 = 24;

/// Perpendicular distance of `p` from the line `a`-`b`.
fn perp_distance(p: Point, a: Point, b: Point) -> f64 {
    let len = a.distance(b);
    if len < f64::EPSILON {
        return p.distance(a);
    }
    ((b.x - a.x) * (a.y - p.y) - (a.x - p.x) * (b.y - a.y)).abs() / len
}

fn flatten_cubic(p0: Point, p1: Point, p2: Point, p3: Point, tolerance: f64, depth: u32, out: &mut Vec<Point>) {
    let flat_enough = depth >= MAX_FLATTEN_DEPTH
        || (perp_distance(p1, p0, p3) <= tolerance && perp_distance(p2, p0, p3) <= tolerance);
    if flat_enough {
        out.push(p3);
        return;
    }
    let (left, right) = split_cubic(p0, p1, p2, p3, 0.5);
    flatten_cubic(left.0, left.1, left.2, left.3, tolerance, depth + 1, out);
    flatten_cubic(right.0, right.1, right.2, right.3, tolerance, depth + 1, out);
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// De Casteljau split of a cubic at parameter `t`.
#[must_use]
pub fn split_cubic(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> ((Point, Point, Point, Point), (Point, Point, Point, Point)) {
    let p01 = lerp(p0, p1, t);
    let p12 = lerp(p1, p2, t);
    let p23 = lerp(p2, p3, t);
    let p012 = lerp(p01, p12, t);
    let p123 = lerp(p12, p23, t);
    let p0123 = lerp(p012, p123, t);
    ((p0, p01, p012, p0123), (p0123, p123, p23, p3))
}

/// Arc synthesis: the straight lead-in segment (if any) plus the cubic
/// approximations. Angles in degrees, circle in the coordinate space the
/// caller is working in (typically user space, transformed by the caller
/// afterwards).
#[must_use]
pub fn arc_segments(cx: f64, cy: f64, r: f64, start_deg: f64, end_deg: f64, negative: bool) -> Vec<Segment> {
    let mut start = start_deg.to_radians();
    let mut end = end_deg.to_radians();
    if negative {
        while start <= end {
            end -= std::f64::consts::TAU;
        }
    } else {
        while end < start {
            end += std::f64::consts::TAU;
        }
    }
    let total = end - start;
    let steps = (total.abs() / (std::f64::consts::FRAC_PI_2)).ceil().max(1.0) as u32;
    let step = total / f64::from(steps);

    let mut out = Vec::with_capacity(steps as usize);
    let mut theta = start;
    for _ in 0..steps {
        let next = theta + step;
        out.push(bezier_arc_segment(cx, cy, r, theta, next));
        theta = next;
    }
    out
}

fn bezier_arc_segment(cx: f64, cy: f64, r: f64, theta0: f64, theta1: f64) -> Segment {
    let alpha = 4.0 / 3.0 * ((theta1 - theta0) / 4.0).tan();
    let p0 = Point::new(cx + r * theta0.cos(), cy + r * theta0.sin());
    let p3 = Point::new(cx + r * theta1.cos(), cy + r * theta1.sin());
    let t0 = Point::new(-theta0.sin(), theta0.cos());
    let t1 = Point::new(-theta1.sin(), theta1.cos());
    let c1 = Point::new(p0.x + alpha * r * t0.x, p0.y + alpha * r * t0.y);
    let c2 = Point::new(p3.x - alpha * r * t1.x, p3.y - alpha * r * t1.y);
    Segment::CurveTo(c1, c2, p3)
}

/// `arct`: tangent circle of radius `r` inscribed in the angle at
/// `current`-`p1`-`p2`. Degrades to a `lineto p1` when collinear.
pub fn arct_segments(current: Point, p1: Point, p2: Point, r: f64) -> Vec<Segment> {
    let v1 = Point::new(current.x - p1.x, current.y - p1.y);
    let v2 = Point::new(p2.x - p1.x, p2.y - p1.y);
    let len1 = (v1.x * v1.x + v1.y * v1.y).sqrt();
    let len2 = (v2.x * v2.x + v2.y * v2.y).sqrt();
    if len1 < f64::EPSILON || len2 < f64::EPSILON || r.abs() < f64::EPSILON {
        return vec![Segment::LineTo(p1)];
    }
    let cos_theta = (v1.x * v2.x + v1.y * v2.y) / (len1 * len2);
    let cos_theta = cos_theta.clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    if theta.abs() < 1e-9 || (std::f64::consts::PI - theta).abs() < 1e-9 {
        return vec![Segment::LineTo(p1)];
    }
    let dist = r / (theta / 2.0).tan();
    let u1 = Point::new(v1.x / len1, v1.y / len1);
    let u2 = Point::new(v2.x / len2, v2.y / len2);
    let tangent1 = Point::new(p1.x + u1.x * dist, p1.y + u1.y * dist);
    let tangent2 = Point::new(p1.x + u2.x * dist, p1.y + u2.y * dist);

    // Bisector direction tells us which side the circle center is on.
    let bis = Point::new(u1.x + u2.x, u1.y + u2.y);
    let bis_len = (bis.x * bis.x + bis.y * bis.y).sqrt();
    let cross = v1.x * v2.y - v1.y * v2.x;
    let negative = cross < 0.0;
    if bis_len < f64::EPSILON {
        return vec![Segment::LineTo(tangent1)];
    }
    let center_dist = r / (theta / 2.0).sin();
    let bis_u = Point::new(bis.x / bis_len, bis.y / bis_len);
    let center = Point::new(p1.x + bis_u.x * center_dist, p1.y + bis_u.y * center_dist);

    let a1 = (tangent1.y - center.y).atan2(tangent1.x - center.x).to_degrees();
    let a2 = (tangent2.y - center.y).atan2(tangent2.x - center.x).to_degrees();

    let mut segs = vec![Segment::LineTo(tangent1)];
    segs.extend(arc_segments(center.x, center.y, r, a1, a2, negative));
    segs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_transform_then_invert_roundtrips() {
        let m = Matrix::translation(10.0, 20.0).concat(&Matrix::scaling(2.0, 3.0));
        let p = Point::new(5.0, 7.0);
        let transformed = m.transform(p);
        let back = m.invert().unwrap().transform(transformed);
        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn anisotropic_scaling_is_detected() {
        let m = Matrix::scaling(1.0, 5.0);
        assert!(m.is_anisotropic());
        assert!(!Matrix::identity().is_anisotropic());
    }

    #[test]
    fn moveto_lineto_builds_single_subpath() {
        let mut path = Path::new();
        path.moveto(Point::new(0.0, 0.0));
        path.lineto(Point::new(10.0, 0.0)).unwrap();
        assert_eq!(path.subpaths.len(), 1);
        assert_eq!(path.current_point(), Some(Point::new(10.0, 0.0)));
    }

    #[test]
    fn lineto_without_moveto_is_nocurrentpoint() {
        let mut path = Path::new();
        let err = path.lineto(Point::new(1.0, 1.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoCurrentPoint);
    }

    #[test]
    fn closepath_reverses_correctly() {
        let mut path = Path::new();
        path.moveto(Point::new(0.0, 0.0));
        path.lineto(Point::new(10.0, 0.0)).unwrap();
        path.lineto(Point::new(10.0, 10.0)).unwrap();
        path.closepath();
        let rev = path.reversepath();
        assert_eq!(rev.subpaths[0].start(), Some(Point::new(10.0, 10.0)));
        assert!(rev.subpaths[0].is_closed());
    }

    #[test]
    fn flatten_keeps_straight_lines_unchanged() {
        let mut path = Path::new();
        path.moveto(Point::new(0.0, 0.0));
        path.lineto(Point::new(10.0, 10.0)).unwrap();
        let flat = path.flatten(0.1);
        assert_eq!(flat.subpaths[0].segments.len(), 2);
    }

    #[test]
    fn arc_quarter_circle_has_one_cubic() {
        let segs = arc_segments(0.0, 0.0, 1.0, 0.0, 90.0, false);
        assert_eq!(segs.len(), 1);
        if let Segment::CurveTo(_, _, p3) = segs[0] {
            assert!((p3.x - 0.0).abs() < 1e-9);
            assert!((p3.y - 1.0).abs() < 1e-9);
        } else {
            panic!("expected a curve segment");
        }
    }
}
