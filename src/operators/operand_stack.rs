//! Stack-manipulation operators: `pop`, `exch`, `dup`, `copy`, `index`,
//! `roll`, `clear`, `count`, `mark`, `cleartomark`, `counttomark`.
//!
//! Grounded on `operators/operand_stack.py`.

use super::pop_int;
use crate::error::{Error, ErrorKind};
use crate::object::{Object, Value};
use crate::stack::{Context, Flow};

fn at(ctx: &Context, depth_from_top: usize) -> Result<Value, Error> {
    let len = ctx.operand.len();
    if depth_from_top >= len {
        return Err(Error::new(ErrorKind::StackUnderflow, "--index--"));
    }
    Ok(ctx.operand[len - 1 - depth_from_top].clone())
}

fn op_pop(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.pop()?;
    Ok(Flow::Ok)
}

fn op_exch(ctx: &mut Context) -> Result<Flow, Error> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    ctx.push(b)?;
    ctx.push(a)?;
    Ok(Flow::Ok)
}

fn op_dup(ctx: &mut Context) -> Result<Flow, Error> {
    let v = at(ctx, 0)?;
    ctx.push(v)?;
    Ok(Flow::Ok)
}

/// The integer form of `copy` (`n copy`, duplicating the top `n` operand-
/// stack elements). Dispatched to from the merged `copy` operator in
/// `operators/mod.rs`, which also covers the composite form in `array.rs`.
pub(crate) fn copy_integer_form(ctx: &mut Context) -> Result<Flow, Error> {
    let n = pop_int(ctx, "copy")?;
    if n < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "copy"));
    }
    let n = n as usize;
    if n > ctx.operand.len() {
        return Err(Error::new(ErrorKind::StackUnderflow, "copy"));
    }
    let start = ctx.operand.len() - n;
    let slice: Vec<Value> = ctx.operand[start..].to_vec();
    for v in slice {
        ctx.push(v)?;
    }
    Ok(Flow::Ok)
}

fn op_index(ctx: &mut Context) -> Result<Flow, Error> {
    let n = pop_int(ctx, "index")?;
    if n < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "index"));
    }
    let v = at(ctx, n as usize)?;
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_roll(ctx: &mut Context) -> Result<Flow, Error> {
    let j = pop_int(ctx, "roll")?;
    let n = pop_int(ctx, "roll")?;
    if n < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "roll"));
    }
    let n = n as usize;
    if n > ctx.operand.len() {
        return Err(Error::new(ErrorKind::StackUnderflow, "roll"));
    }
    if n == 0 {
        return Ok(Flow::Ok);
    }
    let start = ctx.operand.len() - n;
    let shift = j.rem_euclid(n as i32) as usize;
    ctx.operand[start..].rotate_right(shift);
    Ok(Flow::Ok)
}

fn op_clear(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.operand.clear();
    Ok(Flow::Ok)
}

fn op_count(ctx: &mut Context) -> Result<Flow, Error> {
    let n = ctx.operand.len() as i32;
    ctx.push(Value::literal(Object::Int(n)))?;
    Ok(Flow::Ok)
}

fn op_mark(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.push(Value::literal(Object::Mark))?;
    Ok(Flow::Ok)
}

fn find_mark(ctx: &Context) -> Result<usize, Error> {
    ctx.operand
        .iter()
        .rposition(|v| matches!(v.object, Object::Mark))
        .ok_or_else(|| Error::new(ErrorKind::UnmatchedMark, "--mark--"))
}

fn op_cleartomark(ctx: &mut Context) -> Result<Flow, Error> {
    let pos = find_mark(ctx)?;
    ctx.operand.truncate(pos);
    Ok(Flow::Ok)
}

fn op_counttomark(ctx: &mut Context) -> Result<Flow, Error> {
    let pos = find_mark(ctx)?;
    let n = (ctx.operand.len() - pos - 1) as i32;
    ctx.push(Value::literal(Object::Int(n)))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"pop", op_pop);
    ctx.register(b"exch", op_exch);
    ctx.register(b"dup", op_dup);
    ctx.register(b"index", op_index);
    ctx.register(b"roll", op_roll);
    ctx.register(b"clear", op_clear);
    ctx.register(b"count", op_count);
    ctx.register(b"mark", op_mark);
    ctx.register(b"cleartomark", op_cleartomark);
    ctx.register(b"counttomark", op_counttomark);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Number;

    fn pushi(ctx: &mut Context, i: i32) {
        ctx.push(Value::literal(Object::Int(i))).unwrap();
    }

    #[test]
    fn roll_shifts_elements_cyclically() {
        let mut ctx = Context::new();
        pushi(&mut ctx, 1);
        pushi(&mut ctx, 2);
        pushi(&mut ctx, 3);
        pushi(&mut ctx, 3);
        pushi(&mut ctx, 1);
        op_roll(&mut ctx).unwrap();
        let top: Vec<i32> = ctx
            .operand
            .iter()
            .map(|v| match v.object.as_number() {
                Some(Number::Int(i)) => i,
                _ => panic!("expected ints"),
            })
            .collect();
        assert_eq!(top, vec![3, 1, 2]);
    }

    #[test]
    fn counttomark_counts_above_mark() {
        let mut ctx = Context::new();
        op_mark(&mut ctx).unwrap();
        pushi(&mut ctx, 1);
        pushi(&mut ctx, 2);
        op_counttomark(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Int(2) => {}
            other => panic!("expected 2, got {other:?}"),
        }
    }

    #[test]
    fn cleartomark_without_mark_is_unmatchedmark() {
        let mut ctx = Context::new();
        pushi(&mut ctx, 1);
        assert!(op_cleartomark(&mut ctx).is_err());
    }
}
