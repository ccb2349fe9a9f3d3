//! Arithmetic, bitwise and transcendental operators.
//!
//! Grounded on `operators/math.py`. Arithmetic on two integers that would
//! overflow `i32` promotes to `real` rather than wrapping or raising,
//! per the numeric-tower rule.

use super::{pop_number, push_number};
use crate::error::{Error, ErrorKind};
use crate::object::Number;
use crate::stack::{Context, Flow};

fn binary(ctx: &mut Context, op: &'static str, f: impl FnOnce(Number, Number) -> Number) -> Result<Flow, Error> {
    let b = pop_number(ctx, op)?;
    let a = pop_number(ctx, op)?;
    push_number(ctx, f(a, b))?;
    Ok(Flow::Ok)
}

fn op_add(ctx: &mut Context) -> Result<Flow, Error> {
    binary(ctx, "add", Number::add)
}

fn op_sub(ctx: &mut Context) -> Result<Flow, Error> {
    binary(ctx, "sub", Number::sub)
}

fn op_mul(ctx: &mut Context) -> Result<Flow, Error> {
    binary(ctx, "mul", Number::mul)
}

fn op_div(ctx: &mut Context) -> Result<Flow, Error> {
    let b = pop_number(ctx, "div")?;
    let a = pop_number(ctx, "div")?;
    if b.as_f64() == 0.0 {
        return Err(Error::new(ErrorKind::UndefinedResult, "div"));
    }
    push_number(ctx, Number::Real(a.as_f64() / b.as_f64()))?;
    Ok(Flow::Ok)
}

fn op_idiv(ctx: &mut Context) -> Result<Flow, Error> {
    let b = super::pop_int(ctx, "idiv")?;
    let a = super::pop_int(ctx, "idiv")?;
    if b == 0 {
        return Err(Error::new(ErrorKind::UndefinedResult, "idiv"));
    }
    push_number(ctx, Number::Int(a.wrapping_div(b)))?;
    Ok(Flow::Ok)
}

fn op_mod(ctx: &mut Context) -> Result<Flow, Error> {
    let b = super::pop_int(ctx, "mod")?;
    let a = super::pop_int(ctx, "mod")?;
    if b == 0 {
        return Err(Error::new(ErrorKind::UndefinedResult, "mod"));
    }
    push_number(ctx, Number::Int(a.wrapping_rem(b)))?;
    Ok(Flow::Ok)
}

fn op_neg(ctx: &mut Context) -> Result<Flow, Error> {
    let a = pop_number(ctx, "neg")?;
    push_number(ctx, a.neg())?;
    Ok(Flow::Ok)
}

fn op_abs(ctx: &mut Context) -> Result<Flow, Error> {
    let a = pop_number(ctx, "abs")?;
    let result = match a {
        Number::Int(i) => i.checked_abs().map(Number::Int).unwrap_or(Number::Real((i as f64).abs())),
        Number::Real(r) => Number::Real(r.abs()),
    };
    push_number(ctx, result)?;
    Ok(Flow::Ok)
}

fn op_ceiling(ctx: &mut Context) -> Result<Flow, Error> {
    round_like(ctx, "ceiling", f64::ceil)
}

fn op_floor(ctx: &mut Context) -> Result<Flow, Error> {
    round_like(ctx, "floor", f64::floor)
}

fn op_round(ctx: &mut Context) -> Result<Flow, Error> {
    round_like(ctx, "round", f64::round)
}

fn op_truncate(ctx: &mut Context) -> Result<Flow, Error> {
    round_like(ctx, "truncate", f64::trunc)
}

fn round_like(ctx: &mut Context, op: &'static str, f: fn(f64) -> f64) -> Result<Flow, Error> {
    let a = pop_number(ctx, op)?;
    let result = match a {
        Number::Int(i) => Number::Int(i),
        Number::Real(r) => Number::Real(f(r)),
    };
    push_number(ctx, result)?;
    Ok(Flow::Ok)
}

fn op_sqrt(ctx: &mut Context) -> Result<Flow, Error> {
    let a = pop_number(ctx, "sqrt")?;
    if a.as_f64() < 0.0 {
        return Err(Error::new(ErrorKind::RangeCheck, "sqrt"));
    }
    push_number(ctx, Number::Real(a.as_f64().sqrt()))?;
    Ok(Flow::Ok)
}

fn op_sin(ctx: &mut Context) -> Result<Flow, Error> {
    let a = pop_number(ctx, "sin")?;
    push_number(ctx, Number::Real(a.as_f64().to_radians().sin()))?;
    Ok(Flow::Ok)
}

fn op_cos(ctx: &mut Context) -> Result<Flow, Error> {
    let a = pop_number(ctx, "cos")?;
    push_number(ctx, Number::Real(a.as_f64().to_radians().cos()))?;
    Ok(Flow::Ok)
}

fn op_atan(ctx: &mut Context) -> Result<Flow, Error> {
    let den = pop_number(ctx, "atan")?;
    let num = pop_number(ctx, "atan")?;
    if num.as_f64() == 0.0 && den.as_f64() == 0.0 {
        return Err(Error::new(ErrorKind::UndefinedResult, "atan"));
    }
    let mut deg = num.as_f64().atan2(den.as_f64()).to_degrees();
    if deg < 0.0 {
        deg += 360.0;
    }
    push_number(ctx, Number::Real(deg))?;
    Ok(Flow::Ok)
}

fn op_exp(ctx: &mut Context) -> Result<Flow, Error> {
    let exponent = pop_number(ctx, "exp")?;
    let base = pop_number(ctx, "exp")?;
    push_number(ctx, Number::Real(base.as_f64().powf(exponent.as_f64())))?;
    Ok(Flow::Ok)
}

fn op_ln(ctx: &mut Context) -> Result<Flow, Error> {
    let a = pop_number(ctx, "ln")?;
    if a.as_f64() <= 0.0 {
        return Err(Error::new(ErrorKind::RangeCheck, "ln"));
    }
    push_number(ctx, Number::Real(a.as_f64().ln()))?;
    Ok(Flow::Ok)
}

fn op_log(ctx: &mut Context) -> Result<Flow, Error> {
    let a = pop_number(ctx, "log")?;
    if a.as_f64() <= 0.0 {
        return Err(Error::new(ErrorKind::RangeCheck, "log"));
    }
    push_number(ctx, Number::Real(a.as_f64().log10()))?;
    Ok(Flow::Ok)
}

fn op_bitshift(ctx: &mut Context) -> Result<Flow, Error> {
    let shift = super::pop_int(ctx, "bitshift")?;
    let int = super::pop_int(ctx, "bitshift")?;
    let result = if shift >= 0 {
        if shift >= 32 { 0 } else { (int as i64) << shift }
    } else {
        let s = (-shift).min(31);
        ((int as i64) >> s) & 0xFFFF_FFFF
    };
    push_number(ctx, Number::Int(result as i32))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"add", op_add);
    ctx.register(b"sub", op_sub);
    ctx.register(b"mul", op_mul);
    ctx.register(b"div", op_div);
    ctx.register(b"idiv", op_idiv);
    ctx.register(b"mod", op_mod);
    ctx.register(b"neg", op_neg);
    ctx.register(b"abs", op_abs);
    ctx.register(b"ceiling", op_ceiling);
    ctx.register(b"floor", op_floor);
    ctx.register(b"round", op_round);
    ctx.register(b"truncate", op_truncate);
    ctx.register(b"sqrt", op_sqrt);
    ctx.register(b"sin", op_sin);
    ctx.register(b"cos", op_cos);
    ctx.register(b"atan", op_atan);
    ctx.register(b"exp", op_exp);
    ctx.register(b"ln", op_ln);
    ctx.register(b"log", op_log);
    ctx.register(b"bitshift", op_bitshift);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Object, Value};

    fn pushi(ctx: &mut Context, i: i32) {
        ctx.push(Value::literal(Object::Int(i))).unwrap();
    }

    #[test]
    fn add_two_ints_stays_int() {
        let mut ctx = Context::new();
        pushi(&mut ctx, 2);
        pushi(&mut ctx, 3);
        op_add(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Int(5) => {}
            other => panic!("expected Int(5), got {other:?}"),
        }
    }

    #[test]
    fn div_always_produces_real() {
        let mut ctx = Context::new();
        pushi(&mut ctx, 4);
        pushi(&mut ctx, 2);
        op_div(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Real(r) if r == 2.0 => {}
            other => panic!("expected Real(2.0), got {other:?}"),
        }
    }

    #[test]
    fn div_by_zero_is_undefinedresult() {
        let mut ctx = Context::new();
        pushi(&mut ctx, 1);
        pushi(&mut ctx, 0);
        assert!(op_div(&mut ctx).is_err());
    }

    #[test]
    fn idiv_truncates_toward_zero() {
        let mut ctx = Context::new();
        pushi(&mut ctx, 7);
        pushi(&mut ctx, 2);
        op_idiv(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Int(3) => {}
            other => panic!("expected Int(3), got {other:?}"),
        }
    }
}
