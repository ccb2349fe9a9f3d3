//! Encoded and procedural user paths (`upath`, `uappend`, `u*` family).
//!
//! Grounded on `operators/userpath.py`. A user path is either the literal
//! numeric/operator encoding PLRM §8.4 describes (an array alternating
//! numbers with operator names/codes such as `moveto`/`rlineto`) or an
//! ordinary executable procedure that draws via the regular path
//! operators when invoked. `uappend`/`upath` convert between this
//! encoding and a [`Path`].

use crate::error::{Error, ErrorKind};
use crate::path::{Path, Point};

/// One element of a decoded user-path program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserPathOp {
    MoveTo(Point),
    RMoveTo(Point),
    LineTo(Point),
    RLineTo(Point),
    CurveTo(Point, Point, Point),
    RCurveTo(Point, Point, Point),
    Arc { center: Point, radius: f64, angle1: f64, angle2: f64 },
    Arcn { center: Point, radius: f64, angle1: f64, angle2: f64 },
    ClosePath,
    SetBBox { llx: f64, lly: f64, urx: f64, ury: f64 },
    UStrokePath,
}

/// The operator-code numbering PLRM assigns to user-path segment types
/// (used by the packed-numeric encoding variant). Unrecognized codes are
/// a `rangecheck` at the call site.
#[must_use]
pub fn opcode_arity(code: u8) -> Option<(&'static str, usize)> {
    match code {
        0 => Some(("setbbox", 4)),
        1 => Some(("moveto", 2)),
        2 => Some(("rmoveto", 2)),
        3 => Some(("lineto", 2)),
        4 => Some(("rlineto", 2)),
        5 => Some(("curveto", 6)),
        6 => Some(("rcurveto", 6)),
        7 => Some(("arc", 5)),
        8 => Some(("arcn", 5)),
        9 => Some(("closepath", 0)),
        10 => Some(("ustrokepath", 0)),
        _ => None,
    }
}

/// Apply a decoded user-path program to `path`, respecting the same
/// current-point rules as the ordinary path operators. `ctm` transforms
/// each user-space point/control-point into the device-space path.
pub fn apply(path: &mut Path, ctm: &crate::path::Matrix, ops: &[UserPathOp]) -> Result<(), Error> {
    for op in ops {
        match *op {
            UserPathOp::MoveTo(p) => {
                path.moveto(ctm.transform(p));
            }
            UserPathOp::RMoveTo(delta) => {
                let Some(cur) = path.current_point() else {
                    return Err(Error::new(ErrorKind::NoCurrentPoint, "uappend"));
                };
                let user_cur = ctm.invert().map(|inv| inv.transform(cur)).unwrap_or(cur);
                path.moveto(ctm.transform(Point::new(user_cur.x + delta.x, user_cur.y + delta.y)));
            }
            UserPathOp::LineTo(p) => path.lineto(ctm.transform(p))?,
            UserPathOp::RLineTo(delta) => {
                let Some(cur) = path.current_point() else {
                    return Err(Error::new(ErrorKind::NoCurrentPoint, "uappend"));
                };
                let user_cur = ctm.invert().map(|inv| inv.transform(cur)).unwrap_or(cur);
                path.lineto(ctm.transform(Point::new(user_cur.x + delta.x, user_cur.y + delta.y)))?;
            }
            UserPathOp::CurveTo(c1, c2, p3) => path.curveto(ctm.transform(c1), ctm.transform(c2), ctm.transform(p3))?,
            UserPathOp::RCurveTo(d1, d2, d3) => {
                let Some(cur) = path.current_point() else {
                    return Err(Error::new(ErrorKind::NoCurrentPoint, "uappend"));
                };
                let inv = ctm.invert().unwrap_or(crate::path::Matrix::identity());
                let user_cur = inv.transform(cur);
                let c1 = Point::new(user_cur.x + d1.x, user_cur.y + d1.y);
                let c2 = Point::new(c1.x + d2.x, c1.y + d2.y);
                let p3 = Point::new(c2.x + d3.x, c2.y + d3.y);
                path.curveto(ctm.transform(c1), ctm.transform(c2), ctm.transform(p3))?;
            }
            UserPathOp::Arc { center, radius, angle1, angle2 } => {
                for seg in crate::path::arc_segments(center.x, center.y, radius, angle1, angle2, false) {
                    append_transformed(path, ctm, seg)?;
                }
            }
            UserPathOp::Arcn { center, radius, angle1, angle2 } => {
                for seg in crate::path::arc_segments(center.x, center.y, radius, angle1, angle2, true) {
                    append_transformed(path, ctm, seg)?;
                }
            }
            UserPathOp::ClosePath => path.closepath(),
            UserPathOp::SetBBox { llx, lly, urx, ury } => path.user_bbox = Some((llx, lly, urx, ury)),
            UserPathOp::UStrokePath => {
                // Stroking happens at the operator layer (it needs the
                // current graphics-state stroke parameters); here we only
                // record that the program asked for it by leaving the
                // path untouched for the caller to post-process.
            }
        }
    }
    Ok(())
}

fn append_transformed(path: &mut Path, ctm: &crate::path::Matrix, seg: crate::path::Segment) -> Result<(), Error> {
    use crate::path::Segment;
    match seg {
        Segment::MoveTo(p) => {
            path.moveto(ctm.transform(p));
            Ok(())
        }
        Segment::LineTo(p) => path.lineto(ctm.transform(p)),
        Segment::CurveTo(c1, c2, p3) => path.curveto(ctm.transform(c1), ctm.transform(c2), ctm.transform(p3)),
        Segment::ClosePath => {
            path.closepath();
            Ok(())
        }
    }
}

/// `upath`: the inverse of `apply` — decode a device-space [`Path`] back
/// into a user-path program expressed in user space via `inverse_ctm`.
#[must_use]
pub fn decode(path: &Path, inverse_ctm: &crate::path::Matrix) -> Vec<UserPathOp> {
    use crate::path::Segment;
    let mut ops = Vec::new();
    for sub in &path.subpaths {
        for seg in &sub.segments {
            match *seg {
                Segment::MoveTo(p) => ops.push(UserPathOp::MoveTo(inverse_ctm.transform(p))),
                Segment::LineTo(p) => ops.push(UserPathOp::LineTo(inverse_ctm.transform(p))),
                Segment::CurveTo(c1, c2, p3) => ops.push(UserPathOp::CurveTo(
                    inverse_ctm.transform(c1),
                    inverse_ctm.transform(c2),
                    inverse_ctm.transform(p3),
                )),
                Segment::ClosePath => ops.push(UserPathOp::ClosePath),
            }
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Matrix;

    #[test]
    fn moveto_lineto_round_trips_through_decode() {
        let ctm = Matrix::identity();
        let mut path = Path::new();
        let ops = vec![UserPathOp::MoveTo(Point::new(1.0, 2.0)), UserPathOp::LineTo(Point::new(3.0, 4.0))];
        apply(&mut path, &ctm, &ops).unwrap();
        let decoded = decode(&path, &ctm);
        assert_eq!(decoded.len(), 2);
        assert!(matches!(decoded[0], UserPathOp::MoveTo(_)));
    }

    #[test]
    fn opcode_table_covers_plrm_segment_kinds() {
        assert_eq!(opcode_arity(1), Some(("moveto", 2)));
        assert_eq!(opcode_arity(9), Some(("closepath", 0)));
        assert_eq!(opcode_arity(255), None);
    }

    #[test]
    fn rlineto_without_current_point_is_nocurrentpoint() {
        let ctm = Matrix::identity();
        let mut path = Path::new();
        let ops = vec![UserPathOp::RLineTo(Point::new(1.0, 0.0))];
        assert!(apply(&mut path, &ctm, &ops).is_err());
    }
}
