//! Dictionary operators: construction, `def`/`load`/`store`,
//! `begin`/`end`, `known`/`undef`, `where`, `forall` already lives in
//! `array.rs` since it shares the loop-record machinery.
//!
//! Grounded on `operators/dict.py`.

use super::pop_int;
use crate::dict::{Dict, DictKey};
use crate::error::{Error, ErrorKind};
use crate::object::{Name, Object, Value};
use crate::stack::{Context, Flow};
use crate::vm::Backing;

/// Normalize an operand-stack value into a dict key, folding strings into
/// names per PLRM 3.3.3 (`dict.py`'s `_normalize_key`).
fn key_from_value(ctx: &Context, v: &Value, op: &'static str) -> Result<DictKey, Error> {
    if let Object::String(r, view) = &v.object {
        let bytes = ctx
            .vm
            .get(*r)
            .and_then(Backing::as_string)
            .ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))?;
        return Ok(DictKey::Name(Name::new(&bytes[view.offset..view.offset + view.length])));
    }
    DictKey::from_object(&v.object).ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))
}

fn op_dict(ctx: &mut Context) -> Result<Flow, Error> {
    let n = pop_int(ctx, "dict")?;
    if n < 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "dict"));
    }
    let origin = ctx.alloc_origin();
    let r = ctx.vm.alloc(origin, Backing::Dict(Dict::new(n as usize)));
    ctx.push(Value::literal(Object::Dict(r)))?;
    Ok(Flow::Ok)
}

fn op_maxlength(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let Object::Dict(r) = v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "maxlength"));
    };
    let Some(Backing::Dict(d)) = ctx.vm.get(r) else {
        return Err(Error::new(ErrorKind::TypeCheck, "maxlength"));
    };
    ctx.push(Value::literal(Object::Int(d.max_length as i32)))?;
    Ok(Flow::Ok)
}

fn op_def(ctx: &mut Context) -> Result<Flow, Error> {
    let value = ctx.pop()?;
    let key_v = ctx.pop()?;
    let key = key_from_value(ctx, &key_v, "def")?;
    let top = *ctx.dicts.last().expect("dict stack never empty");
    let Some(Backing::Dict(d)) = ctx.vm.get_mut(top) else {
        return Err(Error::new(ErrorKind::TypeCheck, "def"));
    };
    d.insert(key, value);
    Ok(Flow::Ok)
}

fn op_load(ctx: &mut Context) -> Result<Flow, Error> {
    let key_v = ctx.pop()?;
    let Object::Name(name) = &key_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "load"));
    };
    let Some(v) = ctx.lookup_name(name) else {
        return Err(Error::new(ErrorKind::Undefined, "load"));
    };
    ctx.push(v)?;
    Ok(Flow::Ok)
}

fn op_store(ctx: &mut Context) -> Result<Flow, Error> {
    let value = ctx.pop()?;
    let key_v = ctx.pop()?;
    let Object::Name(name) = &key_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "store"));
    };
    let Some(d) = ctx.where_defined(name) else {
        let top = *ctx.dicts.last().expect("dict stack never empty");
        let Some(Backing::Dict(dict)) = ctx.vm.get_mut(top) else {
            return Err(Error::new(ErrorKind::TypeCheck, "store"));
        };
        dict.insert(DictKey::Name(name.clone()), value);
        return Ok(Flow::Ok);
    };
    let Some(Backing::Dict(dict)) = ctx.vm.get_mut(d) else {
        return Err(Error::new(ErrorKind::TypeCheck, "store"));
    };
    dict.insert(DictKey::Name(name.clone()), value);
    Ok(Flow::Ok)
}

pub(crate) fn get_dict(ctx: &mut Context) -> Result<Flow, Error> {
    let key_v = ctx.pop()?;
    let dict_v = ctx.pop()?;
    let Object::Dict(r) = dict_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "get"));
    };
    let key = key_from_value(ctx, &key_v, "get")?;
    let Some(Backing::Dict(d)) = ctx.vm.get(r) else {
        return Err(Error::new(ErrorKind::TypeCheck, "get"));
    };
    let Some(v) = d.get(&key).cloned() else {
        return Err(Error::new(ErrorKind::Undefined, "get"));
    };
    ctx.push(v)?;
    Ok(Flow::Ok)
}

pub(crate) fn put_dict(ctx: &mut Context) -> Result<Flow, Error> {
    let value = ctx.pop()?;
    let key_v = ctx.pop()?;
    let dict_v = ctx.pop()?;
    let Object::Dict(r) = dict_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "put"));
    };
    let key = key_from_value(ctx, &key_v, "put")?;
    let Some(Backing::Dict(d)) = ctx.vm.get_mut(r) else {
        return Err(Error::new(ErrorKind::TypeCheck, "put"));
    };
    d.insert(key, value);
    Ok(Flow::Ok)
}

fn op_undef(ctx: &mut Context) -> Result<Flow, Error> {
    let key_v = ctx.pop()?;
    let dict_v = ctx.pop()?;
    let Object::Dict(r) = dict_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "undef"));
    };
    let key = key_from_value(ctx, &key_v, "undef")?;
    let Some(Backing::Dict(d)) = ctx.vm.get_mut(r) else {
        return Err(Error::new(ErrorKind::TypeCheck, "undef"));
    };
    d.remove(&key);
    Ok(Flow::Ok)
}

fn op_known(ctx: &mut Context) -> Result<Flow, Error> {
    let key_v = ctx.pop()?;
    let dict_v = ctx.pop()?;
    let Object::Dict(r) = dict_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "known"));
    };
    let key = key_from_value(ctx, &key_v, "known")?;
    let Some(Backing::Dict(d)) = ctx.vm.get(r) else {
        return Err(Error::new(ErrorKind::TypeCheck, "known"));
    };
    let found = d.contains(&key);
    ctx.push(Value::literal(Object::Bool(found)))?;
    Ok(Flow::Ok)
}

fn op_where(ctx: &mut Context) -> Result<Flow, Error> {
    let key_v = ctx.pop()?;
    let Object::Name(name) = &key_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "where"));
    };
    match ctx.where_defined(name) {
        Some(d) => {
            ctx.push(Value::literal(Object::Dict(d)))?;
            ctx.push(Value::literal(Object::Bool(true)))?;
        }
        None => ctx.push(Value::literal(Object::Bool(false)))?,
    }
    Ok(Flow::Ok)
}

fn op_begin(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let Object::Dict(r) = v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "begin"));
    };
    ctx.begin(r)?;
    Ok(Flow::Ok)
}

fn op_end(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.end()?;
    Ok(Flow::Ok)
}

fn op_currentdict(ctx: &mut Context) -> Result<Flow, Error> {
    let top = *ctx.dicts.last().expect("dict stack never empty");
    ctx.push(Value::literal(Object::Dict(top)))?;
    Ok(Flow::Ok)
}

fn op_dictstack(ctx: &mut Context) -> Result<Flow, Error> {
    let origin = ctx.alloc_origin();
    let values: Vec<Value> = ctx.dicts.iter().map(|&d| Value::literal(Object::Dict(d))).collect();
    let len = values.len();
    let r = ctx.vm.alloc(origin, Backing::Array(values));
    ctx.push(Value::literal(Object::Array(r, crate::object::View { offset: 0, length: len })))?;
    Ok(Flow::Ok)
}

fn op_countdictstack(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.push(Value::literal(Object::Int(ctx.dicts.len() as i32)))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"dict", op_dict);
    ctx.register(b"maxlength", op_maxlength);
    ctx.register(b"def", op_def);
    ctx.register(b"load", op_load);
    ctx.register(b"store", op_store);
    ctx.register(b"undef", op_undef);
    ctx.register(b"known", op_known);
    ctx.register(b"where", op_where);
    ctx.register(b"begin", op_begin);
    ctx.register(b"end", op_end);
    ctx.register(b"currentdict", op_currentdict);
    ctx.register(b"dictstack", op_dictstack);
    ctx.register(b"countdictstack", op_countdictstack);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn def_then_load_round_trips() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Name(Name::new(b"x")))).unwrap();
        ctx.push(Value::literal(Object::Int(7))).unwrap();
        op_def(&mut ctx).unwrap();
        ctx.push(Value::literal(Object::Name(Name::new(b"x")))).unwrap();
        op_load(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Int(7) => {}
            other => panic!("expected Int(7), got {other:?}"),
        }
    }

    #[test]
    fn known_is_false_for_missing_key() {
        let mut ctx = Context::new();
        op_dict(&mut ctx).unwrap();
        let dict_v = ctx.top().unwrap().clone();
        ctx.push(dict_v).unwrap();
        ctx.push(Value::literal(Object::Name(Name::new(b"nope")))).unwrap();
        op_known(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(false) => {}
            other => panic!("expected false, got {other:?}"),
        }
    }

    #[test]
    fn begin_end_balances_dict_stack() {
        let mut ctx = Context::new();
        op_dict(&mut ctx).unwrap();
        op_begin(&mut ctx).unwrap();
        assert_eq!(ctx.dicts.len(), 4);
        op_end(&mut ctx).unwrap();
        assert_eq!(ctx.dicts.len(), 3);
    }
}
