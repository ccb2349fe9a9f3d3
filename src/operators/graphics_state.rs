//! Device-independent graphics-state operators: color, line parameters,
//! dash pattern, flatness, halftone/transfer stubs, and the
//! `setuserparams`/`setsystemparams` family.
//!
//! Grounded on `operators/device_color_state.py`, `operators/halftone_transfer.py`
//! and `operators/interpreter_params.py`. Halftone/transfer functions are
//! accepted and stored only as opaque procedures: rendering them is
//! out of scope for a core with no rasteriser, so no sampling happens
//! here.

use super::pop_number;
use crate::error::{Error, ErrorKind};
use crate::object::{Object, Value};
use crate::stack::{Color, Context, Flow};
use crate::stroke::{LineCap, LineJoin};

fn op_setgray(ctx: &mut Context) -> Result<Flow, Error> {
    let g = pop_number(ctx, "setgray")?.as_f64().clamp(0.0, 1.0);
    ctx.gs_mut().color = Color::Gray(g);
    Ok(Flow::Ok)
}

fn op_currentgray(ctx: &mut Context) -> Result<Flow, Error> {
    let g = match ctx.gs().color {
        Color::Gray(g) => g,
        Color::Rgb(r, gr, b) => 0.3 * r + 0.59 * gr + 0.11 * b,
        Color::Cmyk(c, m, y, k) => (1.0 - (c + k).min(1.0)).min(1.0 - (m + k).min(1.0)).min(1.0 - (y + k).min(1.0)),
        Color::Hsb(_, _, b) => b,
    };
    ctx.push(Value::literal(Object::Real(g)))?;
    Ok(Flow::Ok)
}

fn op_setrgbcolor(ctx: &mut Context) -> Result<Flow, Error> {
    let b = pop_number(ctx, "setrgbcolor")?.as_f64().clamp(0.0, 1.0);
    let g = pop_number(ctx, "setrgbcolor")?.as_f64().clamp(0.0, 1.0);
    let r = pop_number(ctx, "setrgbcolor")?.as_f64().clamp(0.0, 1.0);
    ctx.gs_mut().color = Color::Rgb(r, g, b);
    Ok(Flow::Ok)
}

fn op_currentrgbcolor(ctx: &mut Context) -> Result<Flow, Error> {
    let (r, g, b) = match ctx.gs().color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Gray(v) => (v, v, v),
        Color::Cmyk(c, m, y, k) => (1.0 - (c + k).min(1.0), 1.0 - (m + k).min(1.0), 1.0 - (y + k).min(1.0)),
        Color::Hsb(h, s, v) => hsb_to_rgb(h, s, v),
    };
    ctx.push(Value::literal(Object::Real(r)))?;
    ctx.push(Value::literal(Object::Real(g)))?;
    ctx.push(Value::literal(Object::Real(b)))?;
    Ok(Flow::Ok)
}

fn hsb_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s <= 0.0 {
        return (v, v, v);
    }
    let h = (h.rem_euclid(1.0)) * 6.0;
    let i = h.floor() as i32;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

fn rgb_to_hsb(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let v = max;
    let s = if max <= 0.0 { 0.0 } else { delta / max };
    let h = if delta <= 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        (((b - r) / delta) + 2.0) / 6.0
    } else {
        (((r - g) / delta) + 4.0) / 6.0
    };
    (h, s, v)
}

fn rgb_to_cmyk(r: f64, g: f64, b: f64) -> (f64, f64, f64, f64) {
    let k = 1.0 - r.max(g).max(b);
    if k >= 1.0 {
        return (0.0, 0.0, 0.0, 1.0);
    }
    ((1.0 - r - k) / (1.0 - k), (1.0 - g - k) / (1.0 - k), (1.0 - b - k) / (1.0 - k), k)
}

/// Resolve the current color to rgb, regardless of which `set*color`
/// variant last wrote it, shared by `currenthsbcolor`/`currentcmykcolor`.
fn as_rgb(color: Color) -> (f64, f64, f64) {
    match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Gray(v) => (v, v, v),
        Color::Cmyk(c, m, y, k) => (1.0 - (c + k).min(1.0), 1.0 - (m + k).min(1.0), 1.0 - (y + k).min(1.0)),
        Color::Hsb(h, s, v) => hsb_to_rgb(h, s, v),
    }
}

fn op_currenthsbcolor(ctx: &mut Context) -> Result<Flow, Error> {
    let (h, s, v) = match ctx.gs().color {
        Color::Hsb(h, s, v) => (h, s, v),
        other => {
            let (r, g, b) = as_rgb(other);
            rgb_to_hsb(r, g, b)
        }
    };
    ctx.push(Value::literal(Object::Real(h)))?;
    ctx.push(Value::literal(Object::Real(s)))?;
    ctx.push(Value::literal(Object::Real(v)))?;
    Ok(Flow::Ok)
}

fn op_currentcmykcolor(ctx: &mut Context) -> Result<Flow, Error> {
    let (c, m, y, k) = match ctx.gs().color {
        Color::Cmyk(c, m, y, k) => (c, m, y, k),
        other => {
            let (r, g, b) = as_rgb(other);
            rgb_to_cmyk(r, g, b)
        }
    };
    ctx.push(Value::literal(Object::Real(c)))?;
    ctx.push(Value::literal(Object::Real(m)))?;
    ctx.push(Value::literal(Object::Real(y)))?;
    ctx.push(Value::literal(Object::Real(k)))?;
    Ok(Flow::Ok)
}

fn op_currentdash(ctx: &mut Context) -> Result<Flow, Error> {
    let origin = ctx.alloc_origin();
    let pattern = ctx.gs().dash_array.clone();
    let len = pattern.len();
    let values: Vec<Value> = pattern.into_iter().map(|n| Value::literal(Object::Real(n))).collect();
    let r = ctx.vm.alloc(origin, crate::vm::Backing::Array(values));
    ctx.push(Value::literal(Object::Array(r, crate::object::View { offset: 0, length: len })))?;
    ctx.push(Value::literal(Object::Real(ctx.gs().dash_offset)))?;
    Ok(Flow::Ok)
}

fn op_sethsbcolor(ctx: &mut Context) -> Result<Flow, Error> {
    let b = pop_number(ctx, "sethsbcolor")?.as_f64().clamp(0.0, 1.0);
    let s = pop_number(ctx, "sethsbcolor")?.as_f64().clamp(0.0, 1.0);
    let h = pop_number(ctx, "sethsbcolor")?.as_f64().clamp(0.0, 1.0);
    ctx.gs_mut().color = Color::Hsb(h, s, b);
    Ok(Flow::Ok)
}

fn op_setcmykcolor(ctx: &mut Context) -> Result<Flow, Error> {
    let k = pop_number(ctx, "setcmykcolor")?.as_f64().clamp(0.0, 1.0);
    let y = pop_number(ctx, "setcmykcolor")?.as_f64().clamp(0.0, 1.0);
    let m = pop_number(ctx, "setcmykcolor")?.as_f64().clamp(0.0, 1.0);
    let c = pop_number(ctx, "setcmykcolor")?.as_f64().clamp(0.0, 1.0);
    ctx.gs_mut().color = Color::Cmyk(c, m, y, k);
    Ok(Flow::Ok)
}

fn op_setlinewidth(ctx: &mut Context) -> Result<Flow, Error> {
    let w = pop_number(ctx, "setlinewidth")?.as_f64();
    if w < 0.0 {
        return Err(Error::new(ErrorKind::RangeCheck, "setlinewidth"));
    }
    ctx.gs_mut().line_width = w;
    Ok(Flow::Ok)
}

fn op_currentlinewidth(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.push(Value::literal(Object::Real(ctx.gs().line_width)))?;
    Ok(Flow::Ok)
}

fn op_setlinecap(ctx: &mut Context) -> Result<Flow, Error> {
    let n = super::pop_int(ctx, "setlinecap")?;
    ctx.gs_mut().line_cap = match n {
        0 => LineCap::Butt,
        1 => LineCap::Round,
        2 => LineCap::ProjectingSquare,
        _ => return Err(Error::new(ErrorKind::RangeCheck, "setlinecap")),
    };
    Ok(Flow::Ok)
}

fn op_currentlinecap(ctx: &mut Context) -> Result<Flow, Error> {
    let n = match ctx.gs().line_cap {
        LineCap::Butt => 0,
        LineCap::Round => 1,
        LineCap::ProjectingSquare => 2,
    };
    ctx.push(Value::literal(Object::Int(n)))?;
    Ok(Flow::Ok)
}

fn op_setlinejoin(ctx: &mut Context) -> Result<Flow, Error> {
    let n = super::pop_int(ctx, "setlinejoin")?;
    ctx.gs_mut().line_join = match n {
        0 => LineJoin::Miter,
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => return Err(Error::new(ErrorKind::RangeCheck, "setlinejoin")),
    };
    Ok(Flow::Ok)
}

fn op_currentlinejoin(ctx: &mut Context) -> Result<Flow, Error> {
    let n = match ctx.gs().line_join {
        LineJoin::Miter => 0,
        LineJoin::Round => 1,
        LineJoin::Bevel => 2,
    };
    ctx.push(Value::literal(Object::Int(n)))?;
    Ok(Flow::Ok)
}

fn op_setmiterlimit(ctx: &mut Context) -> Result<Flow, Error> {
    let limit = pop_number(ctx, "setmiterlimit")?.as_f64();
    if limit < 1.0 {
        return Err(Error::new(ErrorKind::RangeCheck, "setmiterlimit"));
    }
    ctx.gs_mut().miter_limit = limit;
    Ok(Flow::Ok)
}

fn op_currentmiterlimit(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.push(Value::literal(Object::Real(ctx.gs().miter_limit)))?;
    Ok(Flow::Ok)
}

fn op_setdash(ctx: &mut Context) -> Result<Flow, Error> {
    let offset = pop_number(ctx, "setdash")?.as_f64();
    let array_v = ctx.pop()?;
    let Object::Array(r, view) = array_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "setdash"));
    };
    let arr = ctx.vm.get(r).and_then(crate::vm::Backing::as_array).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "setdash"))?;
    let mut pattern = Vec::with_capacity(view.length);
    for v in &arr[view.offset..view.offset + view.length] {
        let n = v.object.as_number().ok_or_else(|| Error::new(ErrorKind::TypeCheck, "setdash"))?.as_f64();
        if n < 0.0 {
            return Err(Error::new(ErrorKind::RangeCheck, "setdash"));
        }
        pattern.push(n);
    }
    if pattern.iter().all(|&n| n == 0.0) && !pattern.is_empty() {
        return Err(Error::new(ErrorKind::RangeCheck, "setdash"));
    }
    ctx.gs_mut().dash_array = pattern;
    ctx.gs_mut().dash_offset = offset;
    Ok(Flow::Ok)
}

fn op_setflat(ctx: &mut Context) -> Result<Flow, Error> {
    let f = pop_number(ctx, "setflat")?.as_f64();
    ctx.gs_mut().flatness = f.clamp(0.2, 100.0);
    Ok(Flow::Ok)
}

fn op_currentflat(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.push(Value::literal(Object::Real(ctx.gs().flatness)))?;
    Ok(Flow::Ok)
}

fn op_setstrokeadjust(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let Object::Bool(b) = v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "setstrokeadjust"));
    };
    ctx.gs_mut().stroke_adjust = b;
    Ok(Flow::Ok)
}

fn op_currentstrokeadjust(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.push(Value::literal(Object::Bool(ctx.gs().stroke_adjust)))?;
    Ok(Flow::Ok)
}

fn op_sethalftone(ctx: &mut Context) -> Result<Flow, Error> {
    // Halftone rendering is out of scope; accept and discard the
    // dictionary, matching the source's "accepted, not sampled" stance.
    ctx.pop()?;
    Ok(Flow::Ok)
}

fn op_settransfer(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.pop()?;
    Ok(Flow::Ok)
}

fn op_setuserparams(ctx: &mut Context) -> Result<Flow, Error> {
    let dict_v = ctx.pop()?;
    let Object::Dict(r) = dict_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "setuserparams"));
    };
    let Some(crate::vm::Backing::Dict(d)) = ctx.vm.get(r) else {
        return Err(Error::new(ErrorKind::TypeCheck, "setuserparams"));
    };
    let d = d.clone();
    if let Some(v) = d.get(&crate::dict::DictKey::Name(crate::object::Name::new(b"MaxOpStack"))) {
        if let Some(n) = v.object.as_number() {
            ctx.user_params.max_op_stack = n.as_f64() as usize;
        }
    }
    if let Some(v) = d.get(&crate::dict::DictKey::Name(crate::object::Name::new(b"MaxDictStack"))) {
        if let Some(n) = v.object.as_number() {
            ctx.user_params.max_dict_stack = n.as_f64() as usize;
        }
    }
    if let Some(v) = d.get(&crate::dict::DictKey::Name(crate::object::Name::new(b"MaxExecStack"))) {
        if let Some(n) = v.object.as_number() {
            ctx.user_params.max_exec_stack = n.as_f64() as usize;
        }
    }
    Ok(Flow::Ok)
}

fn op_currentuserparams(ctx: &mut Context) -> Result<Flow, Error> {
    let origin = ctx.alloc_origin();
    let mut d = crate::dict::Dict::new(8);
    d.insert(
        crate::dict::DictKey::Name(crate::object::Name::new(b"MaxOpStack")),
        Value::literal(Object::Int(ctx.user_params.max_op_stack as i32)),
    );
    d.insert(
        crate::dict::DictKey::Name(crate::object::Name::new(b"MaxDictStack")),
        Value::literal(Object::Int(ctx.user_params.max_dict_stack as i32)),
    );
    d.insert(
        crate::dict::DictKey::Name(crate::object::Name::new(b"MaxExecStack")),
        Value::literal(Object::Int(ctx.user_params.max_exec_stack as i32)),
    );
    let r = ctx.vm.alloc(origin, crate::vm::Backing::Dict(d));
    ctx.push(Value::literal(Object::Dict(r)))?;
    Ok(Flow::Ok)
}

fn op_setsystemparams(ctx: &mut Context) -> Result<Flow, Error> {
    // System parameters are administrative (font cache sizing, build
    // stamps); this crate exposes them read-only, so `setsystemparams`
    // just validates the argument and discards it.
    let v = ctx.pop()?;
    if !matches!(v.object, Object::Dict(_)) {
        return Err(Error::new(ErrorKind::TypeCheck, "setsystemparams"));
    }
    Ok(Flow::Ok)
}

fn op_currentsystemparams(ctx: &mut Context) -> Result<Flow, Error> {
    let origin = ctx.alloc_origin();
    let mut d = crate::dict::Dict::new(4);
    d.insert(
        crate::dict::DictKey::Name(crate::object::Name::new(b"MaxFontCache")),
        Value::literal(Object::Int(ctx.system_params.max_font_cache as i32)),
    );
    let r = ctx.vm.alloc(origin, crate::vm::Backing::Dict(d));
    ctx.push(Value::literal(Object::Dict(r)))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"setgray", op_setgray);
    ctx.register(b"currentgray", op_currentgray);
    ctx.register(b"setrgbcolor", op_setrgbcolor);
    ctx.register(b"currentrgbcolor", op_currentrgbcolor);
    ctx.register(b"sethsbcolor", op_sethsbcolor);
    ctx.register(b"currenthsbcolor", op_currenthsbcolor);
    ctx.register(b"setcmykcolor", op_setcmykcolor);
    ctx.register(b"currentcmykcolor", op_currentcmykcolor);
    ctx.register(b"setlinewidth", op_setlinewidth);
    ctx.register(b"currentlinewidth", op_currentlinewidth);
    ctx.register(b"setlinecap", op_setlinecap);
    ctx.register(b"currentlinecap", op_currentlinecap);
    ctx.register(b"setlinejoin", op_setlinejoin);
    ctx.register(b"currentlinejoin", op_currentlinejoin);
    ctx.register(b"setmiterlimit", op_setmiterlimit);
    ctx.register(b"currentmiterlimit", op_currentmiterlimit);
    ctx.register(b"setdash", op_setdash);
    ctx.register(b"currentdash", op_currentdash);
    ctx.register(b"setflat", op_setflat);
    ctx.register(b"currentflat", op_currentflat);
    ctx.register(b"setstrokeadjust", op_setstrokeadjust);
    ctx.register(b"currentstrokeadjust", op_currentstrokeadjust);
    ctx.register(b"sethalftone", op_sethalftone);
    ctx.register(b"settransfer", op_settransfer);
    ctx.register(b"setuserparams", op_setuserparams);
    ctx.register(b"currentuserparams", op_currentuserparams);
    ctx.register(b"setsystemparams", op_setsystemparams);
    ctx.register(b"currentsystemparams", op_currentsystemparams);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setgray_then_currentgray_round_trips() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Real(0.5))).unwrap();
        op_setgray(&mut ctx).unwrap();
        op_currentgray(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Real(g) if (g - 0.5).abs() < 1e-9 => {}
            other => panic!("expected 0.5, got {other:?}"),
        }
    }

    #[test]
    fn setdash_rejects_all_zero_pattern() {
        let mut ctx = Context::new();
        let origin = ctx.alloc_origin();
        let r = ctx.vm.alloc(origin, crate::vm::Backing::Array(vec![Value::literal(Object::Real(0.0))]));
        ctx.push(Value::literal(Object::Array(r, crate::object::View { offset: 0, length: 1 }))).unwrap();
        ctx.push(Value::literal(Object::Real(0.0))).unwrap();
        assert!(op_setdash(&mut ctx).is_err());
    }

    #[test]
    fn setlinecap_rejects_out_of_range() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(9))).unwrap();
        assert!(op_setlinecap(&mut ctx).is_err());
    }

    #[test]
    fn sethsbcolor_then_currentrgbcolor_matches_known_conversion() {
        let mut ctx = Context::new();
        // Pure red: hue 0, full saturation and value.
        ctx.push(Value::literal(Object::Real(0.0))).unwrap();
        ctx.push(Value::literal(Object::Real(1.0))).unwrap();
        ctx.push(Value::literal(Object::Real(1.0))).unwrap();
        op_sethsbcolor(&mut ctx).unwrap();
        op_currentrgbcolor(&mut ctx).unwrap();
        let b = ctx.pop().unwrap();
        let g = ctx.pop().unwrap();
        let r = ctx.pop().unwrap();
        match (r.object, g.object, b.object) {
            (Object::Real(r), Object::Real(g), Object::Real(b)) => {
                assert!((r - 1.0).abs() < 1e-9 && g.abs() < 1e-9 && b.abs() < 1e-9);
            }
            other => panic!("expected reals, got {other:?}"),
        }
    }

    #[test]
    fn setrgbcolor_then_currenthsbcolor_round_trips_hue() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Real(1.0))).unwrap();
        ctx.push(Value::literal(Object::Real(0.0))).unwrap();
        ctx.push(Value::literal(Object::Real(0.0))).unwrap();
        op_setrgbcolor(&mut ctx).unwrap();
        op_currenthsbcolor(&mut ctx).unwrap();
        let v = ctx.pop().unwrap();
        let s = ctx.pop().unwrap();
        let h = ctx.pop().unwrap();
        match (h.object, s.object, v.object) {
            (Object::Real(h), Object::Real(s), Object::Real(v)) => {
                assert!(h.abs() < 1e-9 && (s - 1.0).abs() < 1e-9 && (v - 1.0).abs() < 1e-9);
            }
            other => panic!("expected reals, got {other:?}"),
        }
    }

    #[test]
    fn setdash_then_currentdash_round_trips() {
        let mut ctx = Context::new();
        let origin = ctx.alloc_origin();
        let r = ctx.vm.alloc(
            origin,
            crate::vm::Backing::Array(vec![Value::literal(Object::Real(20.0)), Value::literal(Object::Real(10.0))]),
        );
        ctx.push(Value::literal(Object::Array(r, crate::object::View { offset: 0, length: 2 }))).unwrap();
        ctx.push(Value::literal(Object::Real(5.0))).unwrap();
        op_setdash(&mut ctx).unwrap();
        op_currentdash(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Real(off) if (off - 5.0).abs() < 1e-9 => {}
            other => panic!("expected offset 5.0, got {other:?}"),
        }
        match ctx.pop().unwrap().object {
            Object::Array(_, view) => assert_eq!(view.length, 2),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn setstrokeadjust_then_currentstrokeadjust_round_trips() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Bool(true))).unwrap();
        op_setstrokeadjust(&mut ctx).unwrap();
        op_currentstrokeadjust(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
    }
}
