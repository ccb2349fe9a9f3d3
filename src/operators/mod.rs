//! The operator library: name → native-function bindings installed into
//! `systemdict`.
//!
//! Grounded on `original_source/postforge/operators/*.py`, one submodule
//! per source file. Every operator is a plain
//! `fn(&mut Context) -> Result<Flow, Error>` registered by [`install`];
//! operators perform their own precondition checks in a fixed order
//! (stack depth, then types, then access, then VM cross-reference, then
//! domain range) and raise the first violation without mutating any
//! stack.

mod array;
mod control_flow;
mod dict;
mod graphics_state;
mod image;
mod insideness;
mod math;
mod misc;
mod operand_stack;
mod path;
mod relational;
mod strokepath;
mod type_convert;
mod userpath;
mod vm;

use crate::error::{Error, ErrorKind};
use crate::object::{Number, Object, Value};
use crate::stack::{Context, Flow};

/// Install every native operator this crate implements into `systemdict`.
/// Call once, before running any program.
pub fn install(ctx: &mut Context) {
    operand_stack::install(ctx);
    math::install(ctx);
    relational::install(ctx);
    array::install(ctx);
    dict::install(ctx);
    control_flow::install(ctx);
    type_convert::install(ctx);
    path::install(ctx);
    strokepath::install(ctx);
    insideness::install(ctx);
    userpath::install(ctx);
    vm::install(ctx);
    graphics_state::install(ctx);
    image::install(ctx);
    misc::install(ctx);
    // `get`, `put` and `copy` are each overloaded across two distinct
    // operand shapes (array.rs's indexed form vs. dict.rs's keyed form;
    // operand_stack.rs's integer form vs. array.rs's composite form).
    // Each submodule above implements its own half; these three
    // dispatchers inspect the relevant operand's type at call time and
    // route to the matching half, so both halves stay reachable under
    // the one systemdict name PostScript gives them.
    ctx.register(b"get", dispatch_get);
    ctx.register(b"put", dispatch_put);
    ctx.register(b"copy", dispatch_copy);
}

/// `get`'s container operand sits one below the top (`container key|index
/// get`); peek it without popping anything before committing to a form.
fn dispatch_get(ctx: &mut Context) -> Result<Flow, Error> {
    let depth = ctx.operand.len();
    let container = depth
        .checked_sub(2)
        .and_then(|i| ctx.operand.get(i))
        .ok_or_else(|| Error::new(ErrorKind::StackUnderflow, "get"))?;
    match &container.object {
        Object::Dict(_) => dict::get_dict(ctx),
        Object::Array(..) | Object::PackedArray(..) | Object::String(..) => array::get_indexed(ctx),
        _ => Err(Error::new(ErrorKind::TypeCheck, "get")),
    }
}

/// `put`'s container operand sits two below the top (`container key|index
/// value put`).
fn dispatch_put(ctx: &mut Context) -> Result<Flow, Error> {
    let depth = ctx.operand.len();
    let container = depth
        .checked_sub(3)
        .and_then(|i| ctx.operand.get(i))
        .ok_or_else(|| Error::new(ErrorKind::StackUnderflow, "put"))?;
    match &container.object {
        Object::Dict(_) => dict::put_dict(ctx),
        Object::Array(..) | Object::PackedArray(..) | Object::String(..) => array::put_indexed(ctx),
        _ => Err(Error::new(ErrorKind::TypeCheck, "put")),
    }
}

/// `copy`'s top operand distinguishes the two forms: an integer (`n
/// copy`) vs. a composite (`src dst copy`).
fn dispatch_copy(ctx: &mut Context) -> Result<Flow, Error> {
    let top = ctx.operand.last().ok_or_else(|| Error::new(ErrorKind::StackUnderflow, "copy"))?;
    match &top.object {
        Object::Int(_) => operand_stack::copy_integer_form(ctx),
        Object::Array(..) | Object::PackedArray(..) | Object::String(..) | Object::Dict(_) => array::copy_composite(ctx),
        _ => Err(Error::new(ErrorKind::TypeCheck, "copy")),
    }
}

/// Pop an operand and require it to be numeric (`typecheck` otherwise) —
/// shared by `math.rs` and `relational.rs`.
pub(crate) fn pop_number(ctx: &mut Context, op: &'static str) -> Result<Number, Error> {
    let v = ctx.pop()?;
    v.object.as_number().ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))
}

pub(crate) fn pop_int(ctx: &mut Context, op: &'static str) -> Result<i32, Error> {
    match ctx.pop()?.object {
        Object::Int(i) => Ok(i),
        _ => Err(Error::new(ErrorKind::TypeCheck, op)),
    }
}

pub(crate) fn pop_bool(ctx: &mut Context, op: &'static str) -> Result<bool, Error> {
    match ctx.pop()?.object {
        Object::Bool(b) => Ok(b),
        _ => Err(Error::new(ErrorKind::TypeCheck, op)),
    }
}

pub(crate) fn push_number(ctx: &mut Context, n: Number) -> Result<(), Error> {
    let obj = match n {
        Number::Int(i) => Object::Int(i),
        Number::Real(r) => Object::Real(r),
    };
    ctx.push(Value::literal(obj))
}
