//! Array, packed-array and string construction/search/access operators.
//!
//! Grounded on `operators/array.py`, `operators/packed_array.py` and
//! `operators/string.py`, consolidated into one submodule since all three
//! share the same `CompositeRef` + `View` shape over the VM arena, a
//! deliberate consolidation, not an omission (see DESIGN.md). `search`/
//! `anchorsearch` return substrings as fresh views over the same backing
//! store rather than copies, the same way `getinterval` does.

use super::pop_int;
use crate::error::{Error, ErrorKind};
use crate::object::{Access, Attribute, CompositeRef, Object, Value, View};
use crate::stack::{Context, Flow};
use crate::vm::Backing;

fn op_array(ctx: &mut Context) -> Result<Flow, Error> {
    let n = pop_int(ctx, "array")?;
    if n < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "array"));
    }
    let origin = ctx.alloc_origin();
    let r = ctx.vm.alloc(origin, Backing::Array(vec![Value::literal(Object::Null); n as usize]));
    ctx.push(Value::literal(Object::Array(r, View { offset: 0, length: n as usize })))?;
    Ok(Flow::Ok)
}

/// `[`: push a mark, exactly like `mark` itself. Paired with `]` below;
/// the evaluator (`Context::dispatch_value`) always executes both of
/// these immediately, even mid-scan inside an enclosing `{ }` body.
fn op_mark_array(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.push(Value::literal(Object::Mark))?;
    Ok(Flow::Ok)
}

/// `]`: collect everything above the nearest mark into a new literal
/// array, replacing the mark and those elements with the single result.
fn op_close_array(ctx: &mut Context) -> Result<Flow, Error> {
    let pos = ctx
        .operand
        .iter()
        .rposition(|v| matches!(v.object, Object::Mark))
        .ok_or_else(|| Error::new(ErrorKind::UnmatchedMark, "]"))?;
    let elements: Vec<Value> = ctx.operand.split_off(pos + 1);
    ctx.operand.pop();
    let origin = ctx.alloc_origin();
    let len = elements.len();
    let r = ctx.vm.alloc(origin, Backing::Array(elements));
    ctx.push(Value::literal(Object::Array(r, View { offset: 0, length: len })))?;
    Ok(Flow::Ok)
}

/// `packedarray`: like `n array ... astore` collapsed into one step,
/// but read-only from construction (PLRM's packed arrays are immutable).
fn op_packedarray(ctx: &mut Context) -> Result<Flow, Error> {
    let n = pop_int(ctx, "packedarray")?;
    if n < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "packedarray"));
    }
    let n = n as usize;
    if n > ctx.operand.len() {
        return Err(Error::new(ErrorKind::StackUnderflow, "packedarray"));
    }
    let start = ctx.operand.len() - n;
    let elements: Vec<Value> = ctx.operand.drain(start..).collect();
    let origin = ctx.alloc_origin();
    let r = ctx.vm.alloc(origin, Backing::Array(elements));
    let mut v = Value::literal(Object::PackedArray(r, View { offset: 0, length: n }));
    let _ = v.set_access(Access::ReadOnly);
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_string(ctx: &mut Context) -> Result<Flow, Error> {
    let n = pop_int(ctx, "string")?;
    if n < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "string"));
    }
    let origin = ctx.alloc_origin();
    let r = ctx.vm.alloc(origin, Backing::String(vec![0u8; n as usize]));
    ctx.push(Value::literal(Object::String(r, View { offset: 0, length: n as usize })))?;
    Ok(Flow::Ok)
}

fn array_view(v: &Value, op: &'static str) -> Result<(CompositeRef, View), Error> {
    match &v.object {
        Object::Array(r, view) | Object::PackedArray(r, view) => Ok((*r, *view)),
        _ => Err(Error::new(ErrorKind::TypeCheck, op)),
    }
}

fn string_view(v: &Value, op: &'static str) -> Result<(CompositeRef, View), Error> {
    match &v.object {
        Object::String(r, view) => Ok((*r, *view)),
        _ => Err(Error::new(ErrorKind::TypeCheck, op)),
    }
}

fn op_length(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let len = match &v.object {
        Object::Array(_, view) | Object::PackedArray(_, view) | Object::String(_, view) => view.length,
        Object::Dict(r) => {
            let Some(Backing::Dict(d)) = ctx.vm.get(*r) else {
                return Err(Error::new(ErrorKind::TypeCheck, "length"));
            };
            d.len()
        }
        Object::Name(n) => n.as_bytes().len(),
        _ => return Err(Error::new(ErrorKind::TypeCheck, "length")),
    };
    ctx.push(Value::literal(Object::Int(len as i32)))?;
    Ok(Flow::Ok)
}

pub(crate) fn get_indexed(ctx: &mut Context) -> Result<Flow, Error> {
    let index = pop_int(ctx, "get")?;
    let container = ctx.pop()?;
    if let Ok((r, view)) = array_view(&container, "get") {
        if index < 0 || index as usize >= view.length {
            return Err(Error::new(ErrorKind::RangeCheck, "get"));
        }
        let Some(arr) = ctx.vm.get(r).and_then(Backing::as_array) else {
            return Err(Error::new(ErrorKind::TypeCheck, "get"));
        };
        let v = arr[view.offset + index as usize].clone();
        ctx.push(v)?;
        return Ok(Flow::Ok);
    }
    if let Ok((r, view)) = string_view(&container, "get") {
        if index < 0 || index as usize >= view.length {
            return Err(Error::new(ErrorKind::RangeCheck, "get"));
        }
        let Some(s) = ctx.vm.get(r).and_then(Backing::as_string) else {
            return Err(Error::new(ErrorKind::TypeCheck, "get"));
        };
        ctx.push(Value::literal(Object::Int(i32::from(s[view.offset + index as usize]))))?;
        return Ok(Flow::Ok);
    }
    Err(Error::new(ErrorKind::TypeCheck, "get"))
}

pub(crate) fn put_indexed(ctx: &mut Context) -> Result<Flow, Error> {
    let value = ctx.pop()?;
    let index = pop_int(ctx, "put")?;
    let container = ctx.pop()?;
    if let Ok((r, view)) = array_view(&container, "put") {
        if index < 0 || index as usize >= view.length {
            return Err(Error::new(ErrorKind::RangeCheck, "put"));
        }
        let Some(arr) = ctx.vm.get_mut(r).and_then(Backing::as_array_mut) else {
            return Err(Error::new(ErrorKind::TypeCheck, "put"));
        };
        arr[view.offset + index as usize] = value;
        return Ok(Flow::Ok);
    }
    if let Ok((r, view)) = string_view(&container, "put") {
        if index < 0 || index as usize >= view.length {
            return Err(Error::new(ErrorKind::RangeCheck, "put"));
        }
        let Object::Int(byte) = value.object else {
            return Err(Error::new(ErrorKind::TypeCheck, "put"));
        };
        let Some(s) = ctx.vm.get_mut(r).and_then(Backing::as_string_mut) else {
            return Err(Error::new(ErrorKind::TypeCheck, "put"));
        };
        s[view.offset + index as usize] = byte as u8;
        return Ok(Flow::Ok);
    }
    Err(Error::new(ErrorKind::TypeCheck, "put"))
}

fn op_getinterval(ctx: &mut Context) -> Result<Flow, Error> {
    let count = pop_int(ctx, "getinterval")?;
    let start = pop_int(ctx, "getinterval")?;
    let container = ctx.pop()?;
    if count < 0 || start < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "getinterval"));
    }
    let (start, count) = (start as usize, count as usize);
    match &container.object {
        Object::Array(r, view) | Object::PackedArray(r, view) => {
            if start + count > view.length {
                return Err(Error::new(ErrorKind::RangeCheck, "getinterval"));
            }
            ctx.push(Value::literal(Object::Array(*r, View { offset: view.offset + start, length: count })))?;
        }
        Object::String(r, view) => {
            if start + count > view.length {
                return Err(Error::new(ErrorKind::RangeCheck, "getinterval"));
            }
            ctx.push(Value::literal(Object::String(*r, View { offset: view.offset + start, length: count })))?;
        }
        _ => return Err(Error::new(ErrorKind::TypeCheck, "getinterval")),
    }
    Ok(Flow::Ok)
}

fn op_putinterval(ctx: &mut Context) -> Result<Flow, Error> {
    let source = ctx.pop()?;
    let start = pop_int(ctx, "putinterval")?;
    let dest = ctx.pop()?;
    if start < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "putinterval"));
    }
    let start = start as usize;
    match (&dest.object, &source.object) {
        (Object::Array(dr, dview), Object::Array(sr, sview) | Object::PackedArray(sr, sview)) => {
            if start + sview.length > dview.length {
                return Err(Error::new(ErrorKind::RangeCheck, "putinterval"));
            }
            let src_values: Vec<Value> = ctx
                .vm
                .get(*sr)
                .and_then(Backing::as_array)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "putinterval"))?
                [sview.offset..sview.offset + sview.length]
                .to_vec();
            let darr = ctx
                .vm
                .get_mut(*dr)
                .and_then(Backing::as_array_mut)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "putinterval"))?;
            darr[dview.offset + start..dview.offset + start + src_values.len()].clone_from_slice(&src_values);
        }
        (Object::String(dr, dview), Object::String(sr, sview)) => {
            if start + sview.length > dview.length {
                return Err(Error::new(ErrorKind::RangeCheck, "putinterval"));
            }
            let src_bytes: Vec<u8> = ctx
                .vm
                .get(*sr)
                .and_then(Backing::as_string)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "putinterval"))?
                [sview.offset..sview.offset + sview.length]
                .to_vec();
            let dstr = ctx
                .vm
                .get_mut(*dr)
                .and_then(Backing::as_string_mut)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "putinterval"))?;
            dstr[dview.offset + start..dview.offset + start + src_bytes.len()].clone_from_slice(&src_bytes);
        }
        _ => return Err(Error::new(ErrorKind::TypeCheck, "putinterval")),
    }
    Ok(Flow::Ok)
}

fn op_aload(ctx: &mut Context) -> Result<Flow, Error> {
    let container = ctx.pop()?;
    let (r, view) = array_view(&container, "aload")?;
    let elements: Vec<Value> = ctx
        .vm
        .get(r)
        .and_then(Backing::as_array)
        .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "aload"))?
        [view.offset..view.offset + view.length]
        .to_vec();
    for v in elements {
        ctx.push(v)?;
    }
    ctx.push(container)?;
    Ok(Flow::Ok)
}

fn op_astore(ctx: &mut Context) -> Result<Flow, Error> {
    let container = ctx.pop()?;
    let (r, view) = array_view(&container, "astore")?;
    if ctx.operand.len() < view.length {
        return Err(Error::new(ErrorKind::StackUnderflow, "astore"));
    }
    let start = ctx.operand.len() - view.length;
    let values: Vec<Value> = ctx.operand.drain(start..).collect();
    let arr = ctx
        .vm
        .get_mut(r)
        .and_then(Backing::as_array_mut)
        .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "astore"))?;
    arr[view.offset..view.offset + view.length].clone_from_slice(&values);
    ctx.push(container)?;
    Ok(Flow::Ok)
}

pub(crate) fn copy_composite(ctx: &mut Context) -> Result<Flow, Error> {
    // `copy` over two composites (distinguished from the integer form in
    // `operand_stack.rs` by the operand's type) copies elements, returning
    // the destination subarray actually written.
    let dest = ctx.pop()?;
    let source = ctx.pop()?;
    match (&source.object, &dest.object) {
        (Object::Array(sr, sview) | Object::PackedArray(sr, sview), Object::Array(dr, dview)) => {
            if sview.length > dview.length {
                return Err(Error::new(ErrorKind::RangeCheck, "copy"));
            }
            let values: Vec<Value> = ctx
                .vm
                .get(*sr)
                .and_then(Backing::as_array)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "copy"))?
                [sview.offset..sview.offset + sview.length]
                .to_vec();
            let darr = ctx
                .vm
                .get_mut(*dr)
                .and_then(Backing::as_array_mut)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "copy"))?;
            darr[dview.offset..dview.offset + values.len()].clone_from_slice(&values);
            ctx.push(Value::literal(Object::Array(*dr, View { offset: dview.offset, length: sview.length })))?;
        }
        (Object::String(sr, sview), Object::String(dr, dview)) => {
            if sview.length > dview.length {
                return Err(Error::new(ErrorKind::RangeCheck, "copy"));
            }
            let bytes: Vec<u8> = ctx
                .vm
                .get(*sr)
                .and_then(Backing::as_string)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "copy"))?
                [sview.offset..sview.offset + sview.length]
                .to_vec();
            let dstr = ctx
                .vm
                .get_mut(*dr)
                .and_then(Backing::as_string_mut)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "copy"))?;
            dstr[dview.offset..dview.offset + bytes.len()].clone_from_slice(&bytes);
            ctx.push(Value::literal(Object::String(*dr, View { offset: dview.offset, length: sview.length })))?;
        }
        (Object::Dict(sr), Object::Dict(dr)) => {
            let entries: Vec<(crate::dict::DictKey, Value)> = ctx
                .vm
                .get(*sr)
                .and_then(Backing::as_dict)
                .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "copy"))?
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let ddict = ctx.vm.get_mut(*dr).and_then(Backing::as_dict_mut).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "copy"))?;
            for (k, v) in entries {
                ddict.insert(k, v);
            }
            ctx.push(Value::literal(Object::Dict(*dr)))?;
        }
        _ => return Err(Error::new(ErrorKind::TypeCheck, "copy")),
    }
    Ok(Flow::Ok)
}

fn op_forall(ctx: &mut Context) -> Result<Flow, Error> {
    let proc = ctx.pop()?;
    let container = ctx.pop()?;
    match &container.object {
        Object::Array(r, view) | Object::PackedArray(r, view) => {
            ctx.exec.push(crate::stack::ExecItem::Loop(crate::stack::LoopRecord::Forall {
                container: *r,
                origin: r.origin,
                view: *view,
                index: 0,
                proc,
                is_dict: false,
            }));
        }
        Object::Dict(r) => {
            ctx.exec.push(crate::stack::ExecItem::Loop(crate::stack::LoopRecord::Forall {
                container: *r,
                origin: r.origin,
                view: View { offset: 0, length: 0 },
                index: 0,
                proc,
                is_dict: true,
            }));
        }
        _ => return Err(Error::new(ErrorKind::TypeCheck, "forall")),
    }
    Ok(Flow::Ok)
}

/// Shared substring scan for `search`/`anchorsearch`: finds `seek`'s bytes
/// inside `string`'s bytes starting no earlier than `from`, and no later
/// than `from` itself when `anchored`.
fn find_substring(haystack: &[u8], needle: &[u8], from: usize, anchored: bool) -> Option<usize> {
    if needle.is_empty() {
        return Some(from);
    }
    if anchored {
        return haystack[from..].starts_with(needle).then_some(from);
    }
    (from..=haystack.len().saturating_sub(needle.len())).find(|&i| haystack[i..].starts_with(needle))
}

fn op_search(ctx: &mut Context) -> Result<Flow, Error> {
    let seek = ctx.pop()?;
    let string = ctx.pop()?;
    let (sr, sview) = string_view(&seek, "search")?;
    let (r, view) = string_view(&string, "search")?;
    let haystack = ctx.vm.get(r).and_then(Backing::as_string).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "search"))?
        [view.offset..view.offset + view.length]
        .to_vec();
    let needle = ctx
        .vm
        .get(sr)
        .and_then(Backing::as_string)
        .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "search"))?[sview.offset..sview.offset + sview.length]
        .to_vec();
    match find_substring(&haystack, &needle, 0, false) {
        Some(at) => {
            let post = View { offset: view.offset + at + needle.len(), length: view.length - at - needle.len() };
            let mtch = View { offset: view.offset + at, length: needle.len() };
            let pre = View { offset: view.offset, length: at };
            ctx.push(Value::literal(Object::String(r, post)))?;
            ctx.push(Value::literal(Object::String(r, mtch)))?;
            ctx.push(Value::literal(Object::String(r, pre)))?;
            ctx.push(Value::literal(Object::Bool(true)))?;
        }
        None => {
            ctx.push(string)?;
            ctx.push(Value::literal(Object::Bool(false)))?;
        }
    }
    Ok(Flow::Ok)
}

fn op_anchorsearch(ctx: &mut Context) -> Result<Flow, Error> {
    let seek = ctx.pop()?;
    let string = ctx.pop()?;
    let (sr, sview) = string_view(&seek, "anchorsearch")?;
    let (r, view) = string_view(&string, "anchorsearch")?;
    let haystack = ctx
        .vm
        .get(r)
        .and_then(Backing::as_string)
        .ok_or_else(|| Error::new(ErrorKind::TypeCheck, "anchorsearch"))?[view.offset..view.offset + view.length]
        .to_vec();
    let needle = ctx.vm.get(sr).and_then(Backing::as_string).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "anchorsearch"))?
        [sview.offset..sview.offset + sview.length]
        .to_vec();
    match find_substring(&haystack, &needle, 0, true) {
        Some(_) => {
            let post = View { offset: view.offset + needle.len(), length: view.length - needle.len() };
            let mtch = View { offset: view.offset, length: needle.len() };
            ctx.push(Value::literal(Object::String(r, post)))?;
            ctx.push(Value::literal(Object::String(r, mtch)))?;
            ctx.push(Value::literal(Object::Bool(true)))?;
        }
        None => {
            ctx.push(string)?;
            ctx.push(Value::literal(Object::Bool(false)))?;
        }
    }
    Ok(Flow::Ok)
}

fn op_cvx(ctx: &mut Context) -> Result<Flow, Error> {
    let mut v = ctx.pop()?;
    v.attr = Attribute::Executable;
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_cvlit(ctx: &mut Context) -> Result<Flow, Error> {
    let mut v = ctx.pop()?;
    v.attr = Attribute::Literal;
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_readonly(ctx: &mut Context) -> Result<Flow, Error> {
    let mut v = ctx.pop()?;
    if !v.set_access(Access::ReadOnly) {
        return Err(Error::new(ErrorKind::InvalidAccess, "readonly"));
    }
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_executeonly(ctx: &mut Context) -> Result<Flow, Error> {
    let mut v = ctx.pop()?;
    if !v.set_access(Access::ExecuteOnly) {
        return Err(Error::new(ErrorKind::InvalidAccess, "executeonly"));
    }
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_noaccess(ctx: &mut Context) -> Result<Flow, Error> {
    let mut v = ctx.pop()?;
    if !v.set_access(Access::None) {
        return Err(Error::new(ErrorKind::InvalidAccess, "noaccess"));
    }
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_rcheck(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let ok = v.access >= Access::ReadOnly;
    ctx.push(Value::literal(Object::Bool(ok)))?;
    Ok(Flow::Ok)
}

fn op_wcheck(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let ok = v.access == Access::Unlimited;
    ctx.push(Value::literal(Object::Bool(ok)))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"[", op_mark_array);
    ctx.register(b"]", op_close_array);
    ctx.register(b"array", op_array);
    ctx.register(b"packedarray", op_packedarray);
    ctx.register(b"string", op_string);
    ctx.register(b"length", op_length);
    ctx.register(b"getinterval", op_getinterval);
    ctx.register(b"putinterval", op_putinterval);
    ctx.register(b"aload", op_aload);
    ctx.register(b"astore", op_astore);
    ctx.register(b"forall", op_forall);
    ctx.register(b"search", op_search);
    ctx.register(b"anchorsearch", op_anchorsearch);
    ctx.register(b"cvx", op_cvx);
    ctx.register(b"cvlit", op_cvlit);
    ctx.register(b"readonly", op_readonly);
    ctx.register(b"executeonly", op_executeonly);
    ctx.register(b"noaccess", op_noaccess);
    ctx.register(b"rcheck", op_rcheck);
    ctx.register(b"wcheck", op_wcheck);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_then_put_then_get_round_trips() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(3))).unwrap();
        op_array(&mut ctx).unwrap();
        let arr = ctx.top().unwrap().clone();
        ctx.push(arr.clone()).unwrap();
        ctx.push(Value::literal(Object::Int(1))).unwrap();
        ctx.push(Value::literal(Object::Int(42))).unwrap();
        put_indexed(&mut ctx).unwrap();
        ctx.push(arr).unwrap();
        ctx.push(Value::literal(Object::Int(1))).unwrap();
        get_indexed(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Int(42) => {}
            other => panic!("expected Int(42), got {other:?}"),
        }
    }

    #[test]
    fn bracket_operators_build_a_literal_array_from_the_mark() {
        let mut ctx = Context::new();
        op_mark_array(&mut ctx).unwrap();
        ctx.push(Value::literal(Object::Int(1))).unwrap();
        ctx.push(Value::literal(Object::Int(2))).unwrap();
        ctx.push(Value::literal(Object::Int(3))).unwrap();
        op_close_array(&mut ctx).unwrap();
        assert_eq!(ctx.operand.len(), 1);
        let (r, view) = array_view(ctx.top().unwrap(), "test").unwrap();
        assert_eq!(view.length, 3);
        let arr = ctx.vm.get(r).and_then(crate::vm::Backing::as_array).unwrap();
        match arr[1].object {
            Object::Int(2) => {}
            ref other => panic!("expected Int(2), got {other:?}"),
        }
    }

    #[test]
    fn packedarray_builds_a_readonly_array_of_n() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(1))).unwrap();
        ctx.push(Value::literal(Object::Int(2))).unwrap();
        ctx.push(Value::literal(Object::Int(2))).unwrap();
        op_packedarray(&mut ctx).unwrap();
        let v = ctx.pop().unwrap();
        assert!(v.access >= Access::ReadOnly);
        let (r, view) = array_view(&v, "test").unwrap();
        assert_eq!(view.length, 2);
        let arr = ctx.vm.get(r).and_then(crate::vm::Backing::as_array).unwrap();
        match (&arr[0].object, &arr[1].object) {
            (Object::Int(1), Object::Int(2)) => {}
            other => panic!("unexpected elements: {other:?}"),
        }
    }

    #[test]
    fn close_array_without_mark_is_unmatchedmark() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(1))).unwrap();
        assert!(op_close_array(&mut ctx).is_err());
    }

    #[test]
    fn getinterval_out_of_range_is_rangecheck() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(3))).unwrap();
        op_array(&mut ctx).unwrap();
        let arr = ctx.pop().unwrap();
        ctx.push(arr).unwrap();
        ctx.push(Value::literal(Object::Int(2))).unwrap();
        ctx.push(Value::literal(Object::Int(5))).unwrap();
        assert!(op_getinterval(&mut ctx).is_err());
    }

    fn literal_string(ctx: &mut Context, bytes: &[u8]) -> Value {
        let origin = ctx.alloc_origin();
        let len = bytes.len();
        let r = ctx.vm.alloc(origin, Backing::String(bytes.to_vec()));
        Value::literal(Object::String(r, View { offset: 0, length: len }))
    }

    fn string_bytes(ctx: &Context, v: &Value) -> Vec<u8> {
        let (r, view) = string_view(v, "test").unwrap();
        ctx.vm.get(r).and_then(Backing::as_string).unwrap()[view.offset..view.offset + view.length].to_vec()
    }

    #[test]
    fn search_finds_a_match_and_splits_pre_match_post() {
        let mut ctx = Context::new();
        let haystack = literal_string(&mut ctx, b"hello world");
        let needle = literal_string(&mut ctx, b"wor");
        ctx.push(haystack).unwrap();
        ctx.push(needle).unwrap();
        op_search(&mut ctx).unwrap();
        let found = ctx.pop().unwrap();
        assert!(matches!(found.object, Object::Bool(true)));
        let pre = ctx.pop().unwrap();
        let mtch = ctx.pop().unwrap();
        let post = ctx.pop().unwrap();
        assert_eq!(string_bytes(&ctx, &pre), b"hello ");
        assert_eq!(string_bytes(&ctx, &mtch), b"wor");
        assert_eq!(string_bytes(&ctx, &post), b"ld");
    }

    #[test]
    fn search_without_a_match_returns_the_original_string_and_false() {
        let mut ctx = Context::new();
        let haystack = literal_string(&mut ctx, b"hello world");
        let needle = literal_string(&mut ctx, b"xyz");
        ctx.push(haystack).unwrap();
        ctx.push(needle).unwrap();
        op_search(&mut ctx).unwrap();
        assert!(matches!(ctx.pop().unwrap().object, Object::Bool(false)));
        let remainder = ctx.pop().unwrap();
        assert_eq!(string_bytes(&ctx, &remainder), b"hello world");
    }

    #[test]
    fn anchorsearch_only_matches_at_the_start() {
        let mut ctx = Context::new();
        let haystack = literal_string(&mut ctx, b"hello world");
        let needle = literal_string(&mut ctx, b"hel");
        ctx.push(haystack).unwrap();
        ctx.push(needle).unwrap();
        op_anchorsearch(&mut ctx).unwrap();
        assert!(matches!(ctx.pop().unwrap().object, Object::Bool(true)));
        let mtch = ctx.pop().unwrap();
        let post = ctx.pop().unwrap();
        assert_eq!(string_bytes(&ctx, &mtch), b"hel");
        assert_eq!(string_bytes(&ctx, &post), b"lo world");
    }

    #[test]
    fn anchorsearch_fails_when_match_is_not_at_the_start() {
        let mut ctx = Context::new();
        let haystack = literal_string(&mut ctx, b"hello world");
        let needle = literal_string(&mut ctx, b"wor");
        ctx.push(haystack).unwrap();
        ctx.push(needle).unwrap();
        op_anchorsearch(&mut ctx).unwrap();
        assert!(matches!(ctx.pop().unwrap().object, Object::Bool(false)));
    }
}
