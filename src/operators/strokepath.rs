//! `stroke`/`strokepath` glue over `crate::stroke`.
//!
//! Grounded on `operators/strokepath.py`. `stroke` appends a `Fill` record
//! to the display list (the filled stroke outline, nonzero rule);
//! `strokepath` replaces the current path with that outline instead of
//! painting it.

use crate::display_list::{self, Fill, FillRule, Record};
use crate::error::Error;
use crate::stack::{Context, Flow};
use crate::stroke::{strokepath, StrokeParams};

fn build_params(ctx: &Context) -> StrokeParams {
    let g = ctx.gs();
    StrokeParams {
        width: g.line_width,
        cap: g.line_cap,
        join: g.line_join,
        miter_limit: g.miter_limit,
        dash_array: g.dash_array.clone(),
        dash_offset: g.dash_offset,
    }
}

fn op_stroke(ctx: &mut Context) -> Result<Flow, Error> {
    let params = build_params(ctx);
    let outline = strokepath(&ctx.gs().path, &ctx.gs().ctm, &params);
    let color = ctx.gs().color;
    let gstate = display_list::gstate_ref(&ctx.gstate);
    ctx.display_list.push(Record::Fill(Fill { path: outline, color, rule: FillRule::NonZero, gstate }));
    Ok(Flow::Ok)
}

fn op_strokepath(ctx: &mut Context) -> Result<Flow, Error> {
    let params = build_params(ctx);
    let outline = strokepath(&ctx.gs().path, &ctx.gs().ctm, &params);
    ctx.gs_mut().path = outline;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"stroke", op_stroke);
    ctx.register(b"strokepath", op_strokepath);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Object, Value};
    use crate::path::Point;

    #[test]
    fn stroke_appends_a_fill_record() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Real(0.0))).unwrap();
        ctx.push(Value::literal(Object::Real(0.0))).unwrap();
        ctx.gs_mut().path.moveto(Point::new(0.0, 0.0));
        ctx.gs_mut().path.lineto(Point::new(10.0, 0.0)).unwrap();
        let before = ctx.display_list.len();
        op_stroke(&mut ctx).unwrap();
        assert_eq!(ctx.display_list.len(), before + 1);
    }

    #[test]
    fn strokepath_replaces_current_path_with_outline() {
        let mut ctx = Context::new();
        ctx.gs_mut().path.moveto(Point::new(0.0, 0.0));
        ctx.gs_mut().path.lineto(Point::new(10.0, 0.0)).unwrap();
        op_strokepath(&mut ctx).unwrap();
        assert!(!ctx.gs().path.subpaths.is_empty());
    }
}
