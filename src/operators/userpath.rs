//! `upath`/`uappend`/`u*` family glue over `crate::userpath`.
//!
//! Grounded on `operators/userpath.py`. The encoded-array form (numbers
//! interleaved with operator-code integers) is decoded directly here
//! rather than routed back through the tokeniser/evaluator, since a user
//! path's opcodes are data, not executable procedures, in that encoding.

use crate::error::{Error, ErrorKind};
use crate::object::Object;
use crate::path::Point;
use crate::stack::{Context, Flow};
use crate::userpath::{self, UserPathOp};
use crate::vm::Backing;

/// Decode the encoded-array form of a user path into [`UserPathOp`]s.
fn decode_encoded(ctx: &Context, r: crate::object::CompositeRef, view: crate::object::View) -> Result<Vec<UserPathOp>, Error> {
    let arr = ctx.vm.get(r).and_then(Backing::as_array).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "uappend"))?;
    let items = &arr[view.offset..view.offset + view.length];
    let mut ops = Vec::new();
    let mut i = 0;
    while i < items.len() {
        let Object::Int(code) = items[i].object else {
            return Err(Error::new(ErrorKind::TypeCheck, "uappend"));
        };
        let Some((name, arity)) = userpath::opcode_arity(code as u8) else {
            return Err(Error::new(ErrorKind::RangeCheck, "uappend"));
        };
        if i + 1 + arity > items.len() {
            return Err(Error::new(ErrorKind::RangeCheck, "uappend"));
        }
        let mut nums = [0.0; 6];
        for k in 0..arity {
            nums[k] = items[i + 1 + k]
                .object
                .as_number()
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "uappend"))?
                .as_f64();
        }
        let op = match name {
            "setbbox" => UserPathOp::SetBBox { llx: nums[0], lly: nums[1], urx: nums[2], ury: nums[3] },
            "moveto" => UserPathOp::MoveTo(Point::new(nums[0], nums[1])),
            "rmoveto" => UserPathOp::RMoveTo(Point::new(nums[0], nums[1])),
            "lineto" => UserPathOp::LineTo(Point::new(nums[0], nums[1])),
            "rlineto" => UserPathOp::RLineTo(Point::new(nums[0], nums[1])),
            "curveto" => UserPathOp::CurveTo(Point::new(nums[0], nums[1]), Point::new(nums[2], nums[3]), Point::new(nums[4], nums[5])),
            "rcurveto" => UserPathOp::RCurveTo(Point::new(nums[0], nums[1]), Point::new(nums[2], nums[3]), Point::new(nums[4], nums[5])),
            "arc" => UserPathOp::Arc { center: Point::new(nums[0], nums[1]), radius: nums[2], angle1: nums[3], angle2: nums[4] },
            "arcn" => UserPathOp::Arcn { center: Point::new(nums[0], nums[1]), radius: nums[2], angle1: nums[3], angle2: nums[4] },
            "closepath" => UserPathOp::ClosePath,
            "ustrokepath" => UserPathOp::UStrokePath,
            _ => unreachable!("opcode_arity only returns known names"),
        };
        ops.push(op);
        i += 1 + arity;
    }
    Ok(ops)
}

fn append(ctx: &mut Context, op_name: &'static str, apply_stroke: bool) -> Result<Flow, Error> {
    let container = ctx.pop()?;
    let Object::Array(r, view) = container.object else {
        return Err(Error::new(ErrorKind::TypeCheck, op_name));
    };
    let ops = decode_encoded(ctx, r, view)?;
    let wants_stroke = apply_stroke || ops.iter().any(|o| matches!(o, UserPathOp::UStrokePath));
    let ctm = ctx.gs().ctm;
    {
        let path = &mut ctx.gs_mut().path;
        userpath::apply(path, &ctm, &ops)?;
    }
    if wants_stroke {
        let params = crate::stroke::StrokeParams {
            width: ctx.gs().line_width,
            cap: ctx.gs().line_cap,
            join: ctx.gs().line_join,
            miter_limit: ctx.gs().miter_limit,
            dash_array: ctx.gs().dash_array.clone(),
            dash_offset: ctx.gs().dash_offset,
        };
        let outline = crate::stroke::strokepath(&ctx.gs().path, &ctx.gs().ctm, &params);
        ctx.gs_mut().path = outline;
    }
    Ok(Flow::Ok)
}

fn op_uappend(ctx: &mut Context) -> Result<Flow, Error> {
    append(ctx, "uappend", false)
}

fn op_upath(ctx: &mut Context) -> Result<Flow, Error> {
    let _insideflag = ctx.pop()?;
    let inv = ctx.gs().ctm.invert().unwrap_or(crate::path::Matrix::identity());
    let ops = userpath::decode(&ctx.gs().path, &inv);
    let origin = ctx.alloc_origin();
    let mut encoded = Vec::new();
    for op in ops {
        match op {
            UserPathOp::MoveTo(p) => {
                encoded.push(crate::object::Value::literal(Object::Real(p.x)));
                encoded.push(crate::object::Value::literal(Object::Real(p.y)));
                encoded.push(crate::object::Value::literal(Object::Int(1)));
            }
            UserPathOp::LineTo(p) => {
                encoded.push(crate::object::Value::literal(Object::Real(p.x)));
                encoded.push(crate::object::Value::literal(Object::Real(p.y)));
                encoded.push(crate::object::Value::literal(Object::Int(3)));
            }
            UserPathOp::CurveTo(c1, c2, p3) => {
                for p in [c1, c2, p3] {
                    encoded.push(crate::object::Value::literal(Object::Real(p.x)));
                    encoded.push(crate::object::Value::literal(Object::Real(p.y)));
                }
                encoded.push(crate::object::Value::literal(Object::Int(5)));
            }
            UserPathOp::ClosePath => encoded.push(crate::object::Value::literal(Object::Int(9))),
            _ => {}
        }
    }
    let len = encoded.len();
    let r = ctx.vm.alloc(origin, Backing::Array(encoded));
    ctx.push(crate::object::Value::literal(Object::Array(r, crate::object::View { offset: 0, length: len })))?;
    Ok(Flow::Ok)
}

fn op_ufill(ctx: &mut Context) -> Result<Flow, Error> {
    append(ctx, "ufill", false)?;
    let path = ctx.gs().path.clone();
    let color = ctx.gs().color;
    let gstate = crate::display_list::gstate_ref(&ctx.gstate);
    ctx.display_list.push(crate::display_list::Record::Fill(crate::display_list::Fill {
        path,
        color,
        rule: crate::display_list::FillRule::NonZero,
        gstate,
    }));
    Ok(Flow::Ok)
}

fn op_ustroke(ctx: &mut Context) -> Result<Flow, Error> {
    append(ctx, "ustroke", true)?;
    let path = ctx.gs().path.clone();
    let color = ctx.gs().color;
    let gstate = crate::display_list::gstate_ref(&ctx.gstate);
    ctx.display_list.push(crate::display_list::Record::Fill(crate::display_list::Fill {
        path,
        color,
        rule: crate::display_list::FillRule::NonZero,
        gstate,
    }));
    Ok(Flow::Ok)
}

fn op_ueofill(ctx: &mut Context) -> Result<Flow, Error> {
    append(ctx, "ueofill", false)?;
    let path = ctx.gs().path.clone();
    let color = ctx.gs().color;
    let gstate = crate::display_list::gstate_ref(&ctx.gstate);
    ctx.display_list.push(crate::display_list::Record::Fill(crate::display_list::Fill {
        path,
        color,
        rule: crate::display_list::FillRule::EvenOdd,
        gstate,
    }));
    Ok(Flow::Ok)
}

/// `ucache` hints that the interpreter should build and cache a device
/// representation of the enclosing user path for reuse. This core has no
/// rendering cache to populate, so it is accepted as a no-op, the same
/// stance `sethalftone`/`settransfer` take toward rendering state this
/// core doesn't sample.
fn op_ucache(_ctx: &mut Context) -> Result<Flow, Error> {
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"uappend", op_uappend);
    ctx.register(b"upath", op_upath);
    ctx.register(b"ufill", op_ufill);
    ctx.register(b"ueofill", op_ueofill);
    ctx.register(b"ustroke", op_ustroke);
    ctx.register(b"ucache", op_ucache);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{CompositeRef, Value, View};
    use crate::vm::Backing;

    fn encoded_square(ctx: &mut Context) -> Value {
        let origin = ctx.alloc_origin();
        let nums: &[(f64, f64, i32)] = &[(0.0, 0.0, 1), (10.0, 0.0, 3), (10.0, 10.0, 3), (0.0, 10.0, 3)];
        let mut values = Vec::new();
        for &(x, y, code) in nums {
            values.push(Value::literal(Object::Real(x)));
            values.push(Value::literal(Object::Real(y)));
            values.push(Value::literal(Object::Int(code)));
        }
        values.push(Value::literal(Object::Int(9)));
        let len = values.len();
        let r: CompositeRef = ctx.vm.alloc(origin, Backing::Array(values));
        Value::literal(Object::Array(r, View { offset: 0, length: len }))
    }

    #[test]
    fn uappend_builds_a_closed_square() {
        let mut ctx = Context::new();
        let v = encoded_square(&mut ctx);
        ctx.push(v).unwrap();
        op_uappend(&mut ctx).unwrap();
        assert_eq!(ctx.gs().path.subpaths.len(), 1);
        assert!(ctx.gs().path.subpaths[0].is_closed());
    }

    #[test]
    fn ueofill_appends_an_evenodd_fill_record() {
        let mut ctx = Context::new();
        let v = encoded_square(&mut ctx);
        ctx.push(v).unwrap();
        op_ueofill(&mut ctx).unwrap();
        match ctx.display_list.records().last() {
            Some(crate::display_list::Record::Fill(f)) => assert_eq!(f.rule, crate::display_list::FillRule::EvenOdd),
            other => panic!("expected a Fill record, got {other:?}"),
        }
    }

    #[test]
    fn ucache_is_accepted_as_a_no_op() {
        let mut ctx = Context::new();
        assert!(op_ucache(&mut ctx).is_ok());
        assert_eq!(ctx.operand.len(), 0);
    }
}
