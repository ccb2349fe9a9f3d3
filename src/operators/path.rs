//! Path construction and coordinate-transform operators.
//!
//! Grounded on `operators/path.py` and `core/matrix.py`. `arct`/`arc`/
//! `arcn` append through `crate::path::arc_segments`/`arct_segments`,
//! transformed by the current CTM at append time (paths are stored in
//! device space, matching the source).

use super::pop_number;
use crate::display_list::{self, Fill, FillRule, Record};
use crate::error::{Error, ErrorKind};
use crate::object::{Object, Value, View};
use crate::path::{Matrix, Point, Segment};
use crate::stack::{Context, Flow};
use crate::vm::Backing;

fn pt(ctx: &mut Context, op: &'static str) -> Result<Point, Error> {
    let y = pop_number(ctx, op)?.as_f64();
    let x = pop_number(ctx, op)?.as_f64();
    Ok(Point::new(x, y))
}

fn op_moveto(ctx: &mut Context) -> Result<Flow, Error> {
    let p = pt(ctx, "moveto")?;
    let ctm = ctx.gs().ctm;
    ctx.gs_mut().path.moveto(ctm.transform(p));
    Ok(Flow::Ok)
}

fn user_current_point(ctx: &Context, op: &'static str) -> Result<Point, Error> {
    let cur = ctx.gs().path.current_point().ok_or_else(|| Error::new(ErrorKind::NoCurrentPoint, op))?;
    let inv = ctx.gs().ctm.invert().unwrap_or(Matrix::identity());
    Ok(inv.transform(cur))
}

fn op_rmoveto(ctx: &mut Context) -> Result<Flow, Error> {
    let delta = pt(ctx, "rmoveto")?;
    let base = user_current_point(ctx, "rmoveto")?;
    let ctm = ctx.gs().ctm;
    ctx.gs_mut().path.moveto(ctm.transform(Point::new(base.x + delta.x, base.y + delta.y)));
    Ok(Flow::Ok)
}

fn op_lineto(ctx: &mut Context) -> Result<Flow, Error> {
    let p = pt(ctx, "lineto")?;
    let ctm = ctx.gs().ctm;
    ctx.gs_mut().path.lineto(ctm.transform(p))?;
    Ok(Flow::Ok)
}

fn op_rlineto(ctx: &mut Context) -> Result<Flow, Error> {
    let delta = pt(ctx, "rlineto")?;
    let base = user_current_point(ctx, "rlineto")?;
    let ctm = ctx.gs().ctm;
    ctx.gs_mut().path.lineto(ctm.transform(Point::new(base.x + delta.x, base.y + delta.y)))?;
    Ok(Flow::Ok)
}

fn op_curveto(ctx: &mut Context) -> Result<Flow, Error> {
    let p3 = pt(ctx, "curveto")?;
    let p2 = pt(ctx, "curveto")?;
    let p1 = pt(ctx, "curveto")?;
    let ctm = ctx.gs().ctm;
    ctx.gs_mut().path.curveto(ctm.transform(p1), ctm.transform(p2), ctm.transform(p3))?;
    Ok(Flow::Ok)
}

fn op_rcurveto(ctx: &mut Context) -> Result<Flow, Error> {
    let d3 = pt(ctx, "rcurveto")?;
    let d2 = pt(ctx, "rcurveto")?;
    let d1 = pt(ctx, "rcurveto")?;
    let base = user_current_point(ctx, "rcurveto")?;
    let c1 = Point::new(base.x + d1.x, base.y + d1.y);
    let c2 = Point::new(c1.x + d2.x, c1.y + d2.y);
    let p3 = Point::new(c2.x + d3.x, c2.y + d3.y);
    let ctm = ctx.gs().ctm;
    ctx.gs_mut().path.curveto(ctm.transform(c1), ctm.transform(c2), ctm.transform(p3))?;
    Ok(Flow::Ok)
}

fn op_closepath(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.gs_mut().path.closepath();
    Ok(Flow::Ok)
}

fn op_newpath(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.gs_mut().path = crate::path::Path::new();
    Ok(Flow::Ok)
}

fn op_currentpoint(ctx: &mut Context) -> Result<Flow, Error> {
    let p = user_current_point(ctx, "currentpoint")?;
    ctx.push(Value::literal(Object::Real(p.x)))?;
    ctx.push(Value::literal(Object::Real(p.y)))?;
    Ok(Flow::Ok)
}

fn op_arc(ctx: &mut Context) -> Result<Flow, Error> {
    arc_impl(ctx, false)
}

fn op_arcn(ctx: &mut Context) -> Result<Flow, Error> {
    arc_impl(ctx, true)
}

fn arc_impl(ctx: &mut Context, negative: bool) -> Result<Flow, Error> {
    let angle2 = pop_number(ctx, "arc")?.as_f64();
    let angle1 = pop_number(ctx, "arc")?.as_f64();
    let r = pop_number(ctx, "arc")?.as_f64();
    let cy = pop_number(ctx, "arc")?.as_f64();
    let cx = pop_number(ctx, "arc")?.as_f64();
    let ctm = ctx.gs().ctm;
    let segs = crate::path::arc_segments(cx, cy, r, angle1, angle2, negative);
    let start = Point::new(cx + r * angle1.to_radians().cos(), cy + r * angle1.to_radians().sin());
    let path = &mut ctx.gs_mut().path;
    if path.current_point().is_some() {
        path.lineto(ctm.transform(start))?;
    } else {
        path.moveto(ctm.transform(start));
    }
    for seg in segs {
        if let Segment::CurveTo(c1, c2, p3) = seg {
            path.curveto(ctm.transform(c1), ctm.transform(c2), ctm.transform(p3))?;
        }
    }
    Ok(Flow::Ok)
}

fn op_arct(ctx: &mut Context) -> Result<Flow, Error> {
    let r = pop_number(ctx, "arct")?.as_f64();
    let p2 = pt(ctx, "arct")?;
    let p1 = pt(ctx, "arct")?;
    let current = user_current_point(ctx, "arct")?;
    let ctm = ctx.gs().ctm;
    let segs = crate::path::arct_segments(current, p1, p2, r);
    let path = &mut ctx.gs_mut().path;
    for seg in segs {
        match seg {
            Segment::LineTo(p) => path.lineto(ctm.transform(p))?,
            Segment::CurveTo(c1, c2, p3) => path.curveto(ctm.transform(c1), ctm.transform(c2), ctm.transform(p3))?,
            _ => {}
        }
    }
    Ok(Flow::Ok)
}

fn op_translate(ctx: &mut Context) -> Result<Flow, Error> {
    let ty = pop_number(ctx, "translate")?.as_f64();
    let tx = pop_number(ctx, "translate")?.as_f64();
    let m = Matrix::translation(tx, ty);
    ctx.gs_mut().ctm = m.concat(&ctx.gs().ctm);
    Ok(Flow::Ok)
}

fn op_scale(ctx: &mut Context) -> Result<Flow, Error> {
    let sy = pop_number(ctx, "scale")?.as_f64();
    let sx = pop_number(ctx, "scale")?.as_f64();
    let m = Matrix::scaling(sx, sy);
    ctx.gs_mut().ctm = m.concat(&ctx.gs().ctm);
    Ok(Flow::Ok)
}

fn op_rotate(ctx: &mut Context) -> Result<Flow, Error> {
    let deg = pop_number(ctx, "rotate")?.as_f64();
    let m = Matrix::rotation(deg);
    ctx.gs_mut().ctm = m.concat(&ctx.gs().ctm);
    Ok(Flow::Ok)
}

fn read_matrix_array(ctx: &Context, v: &Value, op: &'static str) -> Result<Matrix, Error> {
    let Object::Array(r, view) = &v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, op));
    };
    if view.length != 6 {
        return Err(Error::new(ErrorKind::RangeCheck, op));
    }
    let arr = ctx.vm.get(*r).and_then(Backing::as_array).ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))?;
    let mut n = [0.0; 6];
    for (i, slot) in n.iter_mut().enumerate() {
        *slot = arr[view.offset + i].object.as_number().ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))?.as_f64();
    }
    Ok(Matrix { a: n[0], b: n[1], c: n[2], d: n[3], e: n[4], f: n[5] })
}

fn write_matrix_array(ctx: &mut Context, v: &Value, m: &Matrix, op: &'static str) -> Result<(), Error> {
    let Object::Array(r, view) = &v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, op));
    };
    if view.length != 6 {
        return Err(Error::new(ErrorKind::RangeCheck, op));
    }
    let arr = ctx.vm.get_mut(*r).and_then(Backing::as_array_mut).ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))?;
    let values = [m.a, m.b, m.c, m.d, m.e, m.f];
    for (i, value) in values.into_iter().enumerate() {
        arr[view.offset + i] = Value::literal(Object::Real(value));
    }
    Ok(())
}

fn op_matrix(ctx: &mut Context) -> Result<Flow, Error> {
    let origin = ctx.alloc_origin();
    let values: Vec<Value> = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0].into_iter().map(|f| Value::literal(Object::Real(f))).collect();
    let r = ctx.vm.alloc(origin, Backing::Array(values));
    ctx.push(Value::literal(Object::Array(r, View { offset: 0, length: 6 })))?;
    Ok(Flow::Ok)
}

fn op_currentmatrix(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let ctm = ctx.gs().ctm;
    write_matrix_array(ctx, &v, &ctm, "currentmatrix")?;
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_setmatrix(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let m = read_matrix_array(ctx, &v, "setmatrix")?;
    ctx.gs_mut().ctm = m;
    Ok(Flow::Ok)
}

fn op_concat(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let m = read_matrix_array(ctx, &v, "concat")?;
    ctx.gs_mut().ctm = m.concat(&ctx.gs().ctm);
    Ok(Flow::Ok)
}

fn op_transform(ctx: &mut Context) -> Result<Flow, Error> {
    let y = pop_number(ctx, "transform")?.as_f64();
    let x = pop_number(ctx, "transform")?.as_f64();
    let ctm = ctx.gs().ctm;
    let p = ctm.transform(Point::new(x, y));
    ctx.push(Value::literal(Object::Real(p.x)))?;
    ctx.push(Value::literal(Object::Real(p.y)))?;
    Ok(Flow::Ok)
}

fn op_itransform(ctx: &mut Context) -> Result<Flow, Error> {
    let y = pop_number(ctx, "itransform")?.as_f64();
    let x = pop_number(ctx, "itransform")?.as_f64();
    let inv = ctx.gs().ctm.invert().ok_or_else(|| Error::new(ErrorKind::UndefinedResult, "itransform"))?;
    let p = inv.transform(Point::new(x, y));
    ctx.push(Value::literal(Object::Real(p.x)))?;
    ctx.push(Value::literal(Object::Real(p.y)))?;
    Ok(Flow::Ok)
}

fn op_dtransform(ctx: &mut Context) -> Result<Flow, Error> {
    let y = pop_number(ctx, "dtransform")?.as_f64();
    let x = pop_number(ctx, "dtransform")?.as_f64();
    let ctm = ctx.gs().ctm;
    let p = ctm.transform_delta(Point::new(x, y));
    ctx.push(Value::literal(Object::Real(p.x)))?;
    ctx.push(Value::literal(Object::Real(p.y)))?;
    Ok(Flow::Ok)
}

fn op_setbbox(ctx: &mut Context) -> Result<Flow, Error> {
    let ury = pop_number(ctx, "setbbox")?.as_f64();
    let urx = pop_number(ctx, "setbbox")?.as_f64();
    let lly = pop_number(ctx, "setbbox")?.as_f64();
    let llx = pop_number(ctx, "setbbox")?.as_f64();
    ctx.gs_mut().path.user_bbox = Some((llx, lly, urx, ury));
    Ok(Flow::Ok)
}

/// Returns the user-space bounding box: the verbatim `setbbox` override
/// if one is in effect, otherwise the device-space bbox carried back
/// through the inverse CTM. Transforms all four device-space corners
/// rather than just the two extreme points, since a rotated CTM can
/// swap which corner is the user-space minimum/maximum.
fn op_pathbbox(ctx: &mut Context) -> Result<Flow, Error> {
    let user_bbox = ctx.gs().path.user_bbox;
    let (llx, lly, urx, ury) = if let Some(bbox) = user_bbox {
        bbox
    } else {
        let Some((dllx, dlly, durx, dury)) = ctx.gs().path.device_bbox() else {
            return Err(Error::new(ErrorKind::NoCurrentPoint, "pathbbox"));
        };
        let inv = ctx.gs().ctm.invert().unwrap_or(Matrix::identity());
        let corners = [
            inv.transform(Point::new(dllx, dlly)),
            inv.transform(Point::new(durx, dlly)),
            inv.transform(Point::new(durx, dury)),
            inv.transform(Point::new(dllx, dury)),
        ];
        let llx = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let urx = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let lly = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let ury = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        (llx, lly, urx, ury)
    };
    ctx.push(Value::literal(Object::Real(llx)))?;
    ctx.push(Value::literal(Object::Real(lly)))?;
    ctx.push(Value::literal(Object::Real(urx)))?;
    ctx.push(Value::literal(Object::Real(ury)))?;
    Ok(Flow::Ok)
}

fn op_arcto(ctx: &mut Context) -> Result<Flow, Error> {
    let r = pop_number(ctx, "arcto")?.as_f64();
    let p2 = pt(ctx, "arcto")?;
    let p1 = pt(ctx, "arcto")?;
    let current = user_current_point(ctx, "arcto")?;
    let ctm = ctx.gs().ctm;
    let segs = crate::path::arct_segments(current, p1, p2, r);
    let t1 = match segs.first() {
        Some(Segment::LineTo(p)) => *p,
        _ => p1,
    };
    let t2 = match segs.last() {
        Some(Segment::CurveTo(_, _, p3)) => *p3,
        Some(Segment::LineTo(p)) => *p,
        _ => p1,
    };
    let path = &mut ctx.gs_mut().path;
    for seg in &segs {
        match *seg {
            Segment::LineTo(p) => path.lineto(ctm.transform(p))?,
            Segment::CurveTo(c1, c2, p3) => path.curveto(ctm.transform(c1), ctm.transform(c2), ctm.transform(p3))?,
            _ => {}
        }
    }
    ctx.push(Value::literal(Object::Real(t1.x)))?;
    ctx.push(Value::literal(Object::Real(t1.y)))?;
    ctx.push(Value::literal(Object::Real(t2.x)))?;
    ctx.push(Value::literal(Object::Real(t2.y)))?;
    Ok(Flow::Ok)
}

/// Walks the current path's segments, already carried back to user
/// space through the inverse CTM, dispatching each to one of four
/// procedures by segment kind. The walk is driven by
/// [`crate::stack::LoopRecord::PathForall`], the same explicit-record
/// mechanism `forall`'s loop uses, so a procedure calling `exit` unwinds
/// cleanly.
fn op_pathforall(ctx: &mut Context) -> Result<Flow, Error> {
    let closeproc = ctx.pop()?;
    let curveproc = ctx.pop()?;
    let lineproc = ctx.pop()?;
    let moveproc = ctx.pop()?;
    let inv = ctx.gs().ctm.invert().unwrap_or(Matrix::identity());
    let mut segments = Vec::new();
    for sub in &ctx.gs().path.subpaths {
        for seg in &sub.segments {
            let user_seg = match *seg {
                Segment::MoveTo(p) => Segment::MoveTo(inv.transform(p)),
                Segment::LineTo(p) => Segment::LineTo(inv.transform(p)),
                Segment::CurveTo(c1, c2, p3) => Segment::CurveTo(inv.transform(c1), inv.transform(c2), inv.transform(p3)),
                Segment::ClosePath => Segment::ClosePath,
            };
            segments.push(user_seg);
        }
    }
    ctx.exec.push(crate::stack::ExecItem::Loop(crate::stack::LoopRecord::PathForall {
        segments: segments.into(),
        index: 0,
        moveproc,
        lineproc,
        curveproc,
        closeproc,
    }));
    Ok(Flow::Ok)
}

fn paint_fill(ctx: &mut Context, rule: FillRule) -> Result<Flow, Error> {
    let path = ctx.gs().path.clone();
    let color = ctx.gs().color;
    let gstate = display_list::gstate_ref(&ctx.gstate);
    ctx.display_list.push(Record::Fill(Fill { path, color, rule, gstate }));
    Ok(Flow::Ok)
}

fn op_fill(ctx: &mut Context) -> Result<Flow, Error> {
    paint_fill(ctx, FillRule::NonZero)
}

fn op_eofill(ctx: &mut Context) -> Result<Flow, Error> {
    paint_fill(ctx, FillRule::EvenOdd)
}

fn op_flattenpath(ctx: &mut Context) -> Result<Flow, Error> {
    let flatness = ctx.gs().flatness;
    ctx.gs_mut().path = ctx.gs().path.flatten(flatness);
    Ok(Flow::Ok)
}

fn op_reversepath(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.gs_mut().path = ctx.gs().path.reversepath();
    Ok(Flow::Ok)
}

/// `clip`/`eoclip` narrow the clipping path to the current path; without a
/// rasteriser to intersect against, the new path simply replaces the old
/// one, matching the common case of a single `clip` per `gsave` scope.
fn op_clip(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.gs_mut().clip = Some(ctx.gs().path.clone());
    Ok(Flow::Ok)
}

fn op_initclip(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.gs_mut().clip = None;
    Ok(Flow::Ok)
}

fn op_clippath(ctx: &mut Context) -> Result<Flow, Error> {
    if let Some(clip) = ctx.gs().clip.clone() {
        ctx.gs_mut().path = clip;
    }
    Ok(Flow::Ok)
}

fn op_identmatrix(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    write_matrix_array(ctx, &v, &Matrix::identity(), "identmatrix")?;
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_invertmatrix(ctx: &mut Context) -> Result<Flow, Error> {
    let dest = ctx.pop()?;
    let src = ctx.pop()?;
    let m = read_matrix_array(ctx, &src, "invertmatrix")?;
    let inv = m.invert().ok_or_else(|| Error::new(ErrorKind::UndefinedResult, "invertmatrix"))?;
    write_matrix_array(ctx, &dest, &inv, "invertmatrix")?;
    ctx.push(dest)?;
    Ok(Flow::Ok)
}

fn op_idtransform(ctx: &mut Context) -> Result<Flow, Error> {
    let y = pop_number(ctx, "idtransform")?.as_f64();
    let x = pop_number(ctx, "idtransform")?.as_f64();
    let inv = ctx.gs().ctm.invert().ok_or_else(|| Error::new(ErrorKind::UndefinedResult, "idtransform"))?;
    let p = inv.transform_delta(Point::new(x, y));
    ctx.push(Value::literal(Object::Real(p.x)))?;
    ctx.push(Value::literal(Object::Real(p.y)))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"moveto", op_moveto);
    ctx.register(b"rmoveto", op_rmoveto);
    ctx.register(b"lineto", op_lineto);
    ctx.register(b"rlineto", op_rlineto);
    ctx.register(b"curveto", op_curveto);
    ctx.register(b"rcurveto", op_rcurveto);
    ctx.register(b"closepath", op_closepath);
    ctx.register(b"newpath", op_newpath);
    ctx.register(b"currentpoint", op_currentpoint);
    ctx.register(b"arc", op_arc);
    ctx.register(b"arcn", op_arcn);
    ctx.register(b"arct", op_arct);
    ctx.register(b"arcto", op_arcto);
    ctx.register(b"translate", op_translate);
    ctx.register(b"scale", op_scale);
    ctx.register(b"rotate", op_rotate);
    ctx.register(b"matrix", op_matrix);
    ctx.register(b"currentmatrix", op_currentmatrix);
    ctx.register(b"setmatrix", op_setmatrix);
    ctx.register(b"concat", op_concat);
    ctx.register(b"transform", op_transform);
    ctx.register(b"itransform", op_itransform);
    ctx.register(b"dtransform", op_dtransform);
    ctx.register(b"idtransform", op_idtransform);
    ctx.register(b"pathbbox", op_pathbbox);
    ctx.register(b"setbbox", op_setbbox);
    ctx.register(b"pathforall", op_pathforall);
    ctx.register(b"identmatrix", op_identmatrix);
    ctx.register(b"invertmatrix", op_invertmatrix);
    ctx.register(b"fill", op_fill);
    ctx.register(b"eofill", op_eofill);
    ctx.register(b"flattenpath", op_flattenpath);
    ctx.register(b"reversepath", op_reversepath);
    ctx.register(b"clip", op_clip);
    ctx.register(b"eoclip", op_clip);
    ctx.register(b"initclip", op_initclip);
    ctx.register(b"clippath", op_clippath);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pushr(ctx: &mut Context, r: f64) {
        ctx.push(Value::literal(Object::Real(r))).unwrap();
    }

    #[test]
    fn moveto_then_lineto_extends_current_path() {
        let mut ctx = Context::new();
        pushr(&mut ctx, 0.0);
        pushr(&mut ctx, 0.0);
        op_moveto(&mut ctx).unwrap();
        pushr(&mut ctx, 10.0);
        pushr(&mut ctx, 0.0);
        op_lineto(&mut ctx).unwrap();
        op_currentpoint(&mut ctx).unwrap();
        let y = ctx.pop().unwrap();
        let x = ctx.pop().unwrap();
        match (x.object, y.object) {
            (Object::Real(x), Object::Real(y)) => {
                assert!((x - 10.0).abs() < 1e-9);
                assert!(y.abs() < 1e-9);
            }
            other => panic!("expected reals, got {other:?}"),
        }
    }

    #[test]
    fn translate_shifts_subsequent_moveto() {
        let mut ctx = Context::new();
        pushr(&mut ctx, 5.0);
        pushr(&mut ctx, 5.0);
        op_translate(&mut ctx).unwrap();
        pushr(&mut ctx, 0.0);
        pushr(&mut ctx, 0.0);
        op_moveto(&mut ctx).unwrap();
        let p = ctx.gs().path.current_point().unwrap();
        assert!((p.x - 5.0).abs() < 1e-9);
        assert!((p.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn lineto_without_moveto_is_nocurrentpoint() {
        let mut ctx = Context::new();
        pushr(&mut ctx, 1.0);
        pushr(&mut ctx, 1.0);
        assert!(op_lineto(&mut ctx).is_err());
    }

    #[test]
    fn fill_appends_a_nonzero_fill_record() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(crate::path::Point::new(0.0, 0.0));
        ctx.gs_mut().path.lineto(crate::path::Point::new(10.0, 0.0)).unwrap();
        op_fill(&mut ctx).unwrap();
        match ctx.display_list.records().last() {
            Some(crate::display_list::Record::Fill(f)) => assert_eq!(f.rule, crate::display_list::FillRule::NonZero),
            other => panic!("expected a Fill record, got {other:?}"),
        }
    }

    #[test]
    fn eofill_appends_an_evenodd_fill_record() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(crate::path::Point::new(0.0, 0.0));
        ctx.gs_mut().path.lineto(crate::path::Point::new(10.0, 0.0)).unwrap();
        op_eofill(&mut ctx).unwrap();
        match ctx.display_list.records().last() {
            Some(crate::display_list::Record::Fill(f)) => assert_eq!(f.rule, crate::display_list::FillRule::EvenOdd),
            other => panic!("expected a Fill record, got {other:?}"),
        }
    }

    #[test]
    fn clip_then_clippath_restores_the_clipped_path() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(crate::path::Point::new(0.0, 0.0));
        ctx.gs_mut().path.lineto(crate::path::Point::new(10.0, 0.0)).unwrap();
        op_clip(&mut ctx).unwrap();
        assert!(ctx.gs().clip.is_some());
        ctx.gs_mut().path = crate::path::Path::new();
        op_clippath(&mut ctx).unwrap();
        assert!(!ctx.gs().path.is_empty());
    }

    #[test]
    fn initclip_clears_the_clip_path() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(crate::path::Point::new(0.0, 0.0));
        op_clip(&mut ctx).unwrap();
        op_initclip(&mut ctx).unwrap();
        assert!(ctx.gs().clip.is_none());
    }

    #[test]
    fn reversepath_reverses_subpath_direction() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(crate::path::Point::new(0.0, 0.0));
        ctx.gs_mut().path.lineto(crate::path::Point::new(10.0, 0.0)).unwrap();
        op_reversepath(&mut ctx).unwrap();
        let reversed = ctx.gs().path.current_point().unwrap();
        assert!((reversed.x - 0.0).abs() < 1e-9);
    }

    #[test]
    fn invertmatrix_undoes_a_translation() {
        let mut ctx = Context::new();
        op_matrix(&mut ctx).unwrap();
        let src = ctx.pop().unwrap();
        if let Object::Array(r, view) = &src.object {
            let arr = ctx.vm.get_mut(*r).unwrap().as_array_mut().unwrap();
            arr[view.offset + 4] = Value::literal(Object::Real(5.0));
            arr[view.offset + 5] = Value::literal(Object::Real(7.0));
        }
        op_matrix(&mut ctx).unwrap();
        let dest = ctx.pop().unwrap();
        ctx.push(src).unwrap();
        ctx.push(dest).unwrap();
        op_invertmatrix(&mut ctx).unwrap();
        let v = ctx.pop().unwrap();
        let m = read_matrix_array(&ctx, &v, "test").unwrap();
        let p = m.transform(Point::new(5.0, 7.0));
        assert!(p.x.abs() < 1e-9 && p.y.abs() < 1e-9);
    }

    #[test]
    fn idtransform_ignores_translation_component() {
        let mut ctx = Context::new();
        pushr(&mut ctx, 100.0);
        pushr(&mut ctx, 0.0);
        op_translate(&mut ctx).unwrap();
        pushr(&mut ctx, 1.0);
        pushr(&mut ctx, 0.0);
        op_idtransform(&mut ctx).unwrap();
        let y = ctx.pop().unwrap();
        let x = ctx.pop().unwrap();
        match (x.object, y.object) {
            (Object::Real(x), Object::Real(y)) => {
                assert!((x - 1.0).abs() < 1e-9);
                assert!(y.abs() < 1e-9);
            }
            other => panic!("expected reals, got {other:?}"),
        }
    }

    #[test]
    fn pathbbox_returns_user_space_under_a_scaled_ctm() {
        let mut ctx = Context::new();
        pushr(&mut ctx, 2.0);
        pushr(&mut ctx, 2.0);
        op_scale(&mut ctx).unwrap();
        pushr(&mut ctx, 0.0);
        pushr(&mut ctx, 0.0);
        op_moveto(&mut ctx).unwrap();
        pushr(&mut ctx, 10.0);
        pushr(&mut ctx, 0.0);
        op_lineto(&mut ctx).unwrap();
        op_pathbbox(&mut ctx).unwrap();
        let ury = ctx.pop().unwrap();
        let urx = ctx.pop().unwrap();
        let _lly = ctx.pop().unwrap();
        let _llx = ctx.pop().unwrap();
        match (urx.object, ury.object) {
            (Object::Real(urx), Object::Real(ury)) => {
                assert!((urx - 10.0).abs() < 1e-9, "expected user-space urx 10.0, got {urx}");
                assert!(ury.abs() < 1e-9);
            }
            other => panic!("expected reals, got {other:?}"),
        }
    }

    #[test]
    fn setbbox_then_pathbbox_returns_verbatim_override() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(crate::path::Point::new(0.0, 0.0));
        pushr(&mut ctx, -1.0);
        pushr(&mut ctx, -2.0);
        pushr(&mut ctx, 3.0);
        pushr(&mut ctx, 4.0);
        op_setbbox(&mut ctx).unwrap();
        op_pathbbox(&mut ctx).unwrap();
        let ury = ctx.pop().unwrap();
        let urx = ctx.pop().unwrap();
        let lly = ctx.pop().unwrap();
        let llx = ctx.pop().unwrap();
        match (llx.object, lly.object, urx.object, ury.object) {
            (Object::Real(llx), Object::Real(lly), Object::Real(urx), Object::Real(ury)) => {
                assert_eq!((llx, lly, urx, ury), (-1.0, -2.0, 3.0, 4.0));
            }
            other => panic!("expected reals, got {other:?}"),
        }
    }

    #[test]
    fn arcto_pushes_the_two_tangent_points() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(crate::path::Point::new(0.0, 0.0));
        pushr(&mut ctx, 10.0);
        pushr(&mut ctx, 0.0);
        pushr(&mut ctx, 10.0);
        pushr(&mut ctx, 10.0);
        pushr(&mut ctx, 1.0);
        op_arcto(&mut ctx).unwrap();
        let yt2 = ctx.pop().unwrap();
        let xt2 = ctx.pop().unwrap();
        let yt1 = ctx.pop().unwrap();
        let xt1 = ctx.pop().unwrap();
        match (xt1.object, yt1.object, xt2.object, yt2.object) {
            (Object::Real(xt1), Object::Real(yt1), Object::Real(xt2), Object::Real(yt2)) => {
                assert!((xt1 - 9.0).abs() < 1e-9, "expected first tangent near x=9, got {xt1}");
                assert!(yt1.abs() < 1e-9);
                assert!((xt2 - 10.0).abs() < 1e-9);
                assert!((yt2 - 1.0).abs() < 1e-9);
            }
            other => panic!("expected reals, got {other:?}"),
        }
    }

    fn run_source(src: &'static [u8]) -> Context {
        let mut ctx = Context::new();
        install(&mut ctx);
        ctx.exec.push(crate::stack::ExecItem::File(Box::new(crate::bytestream::SliceSource::new(src))));
        ctx.run().unwrap();
        ctx
    }

    #[test]
    fn pathforall_visits_moveto_then_lineto_with_user_space_operands() {
        let ctx = run_source(b"0 0 moveto 5 0 lineto {} {} {} {} pathforall");
        assert_eq!(ctx.operand.len(), 4);
        let got: Vec<f64> = ctx
            .operand
            .iter()
            .map(|v| match v.object {
                Object::Real(n) => n,
                Object::Int(n) => n as f64,
                other => panic!("expected a number, got {other:?}"),
            })
            .collect();
        assert_eq!(got, vec![0.0, 0.0, 5.0, 0.0]);
    }

    #[test]
    fn pathforall_runs_closeproc_for_a_closed_subpath() {
        let ctx = run_source(b"0 0 moveto 5 0 lineto closepath {pop pop} {pop pop} {} {1} pathforall");
        assert_eq!(ctx.operand.len(), 1);
        match ctx.operand[0].object {
            Object::Int(1) => {}
            other => panic!("expected the closeproc marker, got {other:?}"),
        }
    }
}
