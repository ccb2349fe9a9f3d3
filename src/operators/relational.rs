//! Relational, boolean and bitwise-on-booleans operators: `eq`, `ne`,
//! `gt`, `ge`, `lt`, `le`, `and`, `or`, `not`, `xor`.
//!
//! Grounded on `operators/relational.py`. `and`/`or`/`xor`/`not` are
//! overloaded over both `bool` and `int` operands per PLRM 8.2; `eq`/`ne`
//! compare numbers across the int/real boundary and strings by content,
//! everything else by identity.

use super::pop_number;
use crate::error::{Error, ErrorKind};
use crate::object::{Object, Value};
use crate::stack::{Context, Flow};
use crate::vm::Backing;

fn values_equal(ctx: &Context, a: &Value, b: &Value) -> bool {
    match (&a.object, &b.object) {
        (Object::Null, Object::Null) => true,
        (Object::Bool(x), Object::Bool(y)) => x == y,
        (Object::Mark, Object::Mark) => true,
        (Object::Name(x), Object::Name(y)) => x == y,
        (Object::Int(_) | Object::Real(_), Object::Int(_) | Object::Real(_)) => {
            let (Some(x), Some(y)) = (a.object.as_number(), b.object.as_number()) else { return false };
            x.as_f64() == y.as_f64()
        }
        (Object::String(ra, va), Object::String(rb, vb)) => {
            let bytes_a = ctx.vm.get(*ra).and_then(Backing::as_string);
            let bytes_b = ctx.vm.get(*rb).and_then(Backing::as_string);
            match (bytes_a, bytes_b) {
                (Some(sa), Some(sb)) => {
                    let sa = &sa[va.offset..va.offset + va.length];
                    let sb = &sb[vb.offset..vb.offset + vb.length];
                    sa == sb
                }
                _ => false,
            }
        }
        (Object::Array(ra, _), Object::Array(rb, _)) => ra == rb,
        (Object::Dict(ra), Object::Dict(rb)) => ra == rb,
        (Object::Operator(x), Object::Operator(y)) => x == y,
        _ => false,
    }
}

fn op_eq(ctx: &mut Context) -> Result<Flow, Error> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    let result = values_equal(ctx, &a, &b);
    ctx.push(Value::literal(Object::Bool(result)))?;
    Ok(Flow::Ok)
}

fn op_ne(ctx: &mut Context) -> Result<Flow, Error> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    let result = !values_equal(ctx, &a, &b);
    ctx.push(Value::literal(Object::Bool(result)))?;
    Ok(Flow::Ok)
}

fn compare(ctx: &mut Context, op: &'static str, f: impl FnOnce(f64, f64) -> bool) -> Result<Flow, Error> {
    let b = pop_number(ctx, op)?;
    let a = pop_number(ctx, op)?;
    ctx.push(Value::literal(Object::Bool(f(a.as_f64(), b.as_f64()))))?;
    Ok(Flow::Ok)
}

fn op_gt(ctx: &mut Context) -> Result<Flow, Error> {
    compare(ctx, "gt", |a, b| a > b)
}

fn op_ge(ctx: &mut Context) -> Result<Flow, Error> {
    compare(ctx, "ge", |a, b| a >= b)
}

fn op_lt(ctx: &mut Context) -> Result<Flow, Error> {
    compare(ctx, "lt", |a, b| a < b)
}

fn op_le(ctx: &mut Context) -> Result<Flow, Error> {
    compare(ctx, "le", |a, b| a <= b)
}

fn op_and(ctx: &mut Context) -> Result<Flow, Error> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    bool_or_int(ctx, "and", a, b, |x, y| x && y, |x, y| x & y)
}

fn op_or(ctx: &mut Context) -> Result<Flow, Error> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    bool_or_int(ctx, "or", a, b, |x, y| x || y, |x, y| x | y)
}

fn op_xor(ctx: &mut Context) -> Result<Flow, Error> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    bool_or_int(ctx, "xor", a, b, |x, y| x != y, |x, y| x ^ y)
}

fn bool_or_int(
    ctx: &mut Context,
    op: &'static str,
    a: Value,
    b: Value,
    bf: impl FnOnce(bool, bool) -> bool,
    intf: impl FnOnce(i32, i32) -> i32,
) -> Result<Flow, Error> {
    match (a.object, b.object) {
        (Object::Bool(x), Object::Bool(y)) => {
            ctx.push(Value::literal(Object::Bool(bf(x, y))))?;
            Ok(Flow::Ok)
        }
        (Object::Int(x), Object::Int(y)) => {
            ctx.push(Value::literal(Object::Int(intf(x, y))))?;
            Ok(Flow::Ok)
        }
        _ => Err(Error::new(ErrorKind::TypeCheck, op)),
    }
}

fn op_not(ctx: &mut Context) -> Result<Flow, Error> {
    match ctx.pop()?.object {
        Object::Bool(x) => {
            ctx.push(Value::literal(Object::Bool(!x)))?;
            Ok(Flow::Ok)
        }
        Object::Int(x) => {
            ctx.push(Value::literal(Object::Int(!x)))?;
            Ok(Flow::Ok)
        }
        _ => Err(Error::new(ErrorKind::TypeCheck, "not")),
    }
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"eq", op_eq);
    ctx.register(b"ne", op_ne);
    ctx.register(b"gt", op_gt);
    ctx.register(b"ge", op_ge);
    ctx.register(b"lt", op_lt);
    ctx.register(b"le", op_le);
    ctx.register(b"and", op_and);
    ctx.register(b"or", op_or);
    ctx.register(b"xor", op_xor);
    ctx.register(b"not", op_not);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pushi(ctx: &mut Context, i: i32) {
        ctx.push(Value::literal(Object::Int(i))).unwrap();
    }

    #[test]
    fn eq_compares_int_and_real_across_types() {
        let mut ctx = Context::new();
        pushi(&mut ctx, 2);
        ctx.push(Value::literal(Object::Real(2.0))).unwrap();
        op_eq(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
    }

    #[test]
    fn and_on_ints_is_bitwise() {
        let mut ctx = Context::new();
        pushi(&mut ctx, 0b1100);
        pushi(&mut ctx, 0b1010);
        op_and(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Int(0b1000) => {}
            other => panic!("expected 0b1000, got {other:?}"),
        }
    }

    #[test]
    fn not_on_bool_negates() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Bool(true))).unwrap();
        op_not(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(false) => {}
            other => panic!("expected false, got {other:?}"),
        }
    }
}
