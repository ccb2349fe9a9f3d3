//! `infill`/`ineofill`/`instroke` glue over `crate::insideness`.
//!
//! Grounded on `operators/insideness.py`. Takes `x y` off the operand
//! stack and tests it against the current path (or, for `instroke`, the
//! current path's stroke outline) under the current CTM.

use super::pop_number;
use crate::error::Error;
use crate::insideness::{infill, ineofill, instroke};
use crate::object::{Object, Value};
use crate::stack::Context;
use crate::stack::Flow;
use crate::stroke::StrokeParams;

fn point(ctx: &mut Context, op: &'static str) -> Result<crate::path::Point, Error> {
    let y = pop_number(ctx, op)?.as_f64();
    let x = pop_number(ctx, op)?.as_f64();
    Ok(crate::path::Point::new(x, y))
}

fn op_infill(ctx: &mut Context) -> Result<Flow, Error> {
    let p = point(ctx, "infill")?;
    let result = infill(&ctx.gs().path, p, ctx.gs().flatness);
    ctx.push(Value::literal(Object::Bool(result)))?;
    Ok(Flow::Ok)
}

fn op_ineofill(ctx: &mut Context) -> Result<Flow, Error> {
    let p = point(ctx, "ineofill")?;
    let result = ineofill(&ctx.gs().path, p, ctx.gs().flatness);
    ctx.push(Value::literal(Object::Bool(result)))?;
    Ok(Flow::Ok)
}

fn op_instroke(ctx: &mut Context) -> Result<Flow, Error> {
    let p = point(ctx, "instroke")?;
    let g = ctx.gs();
    let params = StrokeParams {
        width: g.line_width,
        cap: g.line_cap,
        join: g.line_join,
        miter_limit: g.miter_limit,
        dash_array: g.dash_array.clone(),
        dash_offset: g.dash_offset,
    };
    let result = instroke(&ctx.gs().path, p, &ctx.gs().ctm, &params, ctx.gs().flatness);
    ctx.push(Value::literal(Object::Bool(result)))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"infill", op_infill);
    ctx.register(b"ineofill", op_ineofill);
    ctx.register(b"instroke", op_instroke);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Point;

    #[test]
    fn infill_reports_true_for_point_inside_square() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(Point::new(0.0, 0.0));
        ctx.gs_mut().path.lineto(Point::new(10.0, 0.0)).unwrap();
        ctx.gs_mut().path.lineto(Point::new(10.0, 10.0)).unwrap();
        ctx.gs_mut().path.lineto(Point::new(0.0, 10.0)).unwrap();
        ctx.gs_mut().path.closepath();
        ctx.push(Value::literal(Object::Real(5.0))).unwrap();
        ctx.push(Value::literal(Object::Real(5.0))).unwrap();
        op_infill(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
    }
}
