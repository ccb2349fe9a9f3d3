//! Type conversion and introspection: `cvi`, `cvr`, `cvs`, `type`,
//! `xcheck`.
//!
//! `cvlit`/`cvx`/`readonly`/`executeonly`/`noaccess`/`rcheck`/`wcheck`
//! live in `array.rs` since they operate uniformly across every object
//! kind carried by a [`Value`], not specifically on numbers or strings.
//!
//! Grounded on `operators/type_convert.py`.

use crate::error::{Error, ErrorKind};
use crate::object::{Name, Object, Value, View};
use crate::stack::{Context, Flow};
use crate::vm::Backing;

fn op_cvi(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let i = match v.object {
        Object::Int(i) => i,
        Object::Real(r) => {
            if !r.is_finite() || r < i32::MIN as f64 || r > i32::MAX as f64 {
                return Err(Error::new(ErrorKind::RangeCheck, "cvi"));
            }
            r as i32
        }
        Object::String(r, view) => {
            let bytes = ctx.vm.get(r).and_then(Backing::as_string).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "cvi"))?;
            let text = std::str::from_utf8(&bytes[view.offset..view.offset + view.length])
                .map_err(|_| Error::new(ErrorKind::SyntaxError, "cvi"))?;
            text.trim()
                .parse::<f64>()
                .map_err(|_| Error::new(ErrorKind::SyntaxError, "cvi"))? as i32
        }
        _ => return Err(Error::new(ErrorKind::TypeCheck, "cvi")),
    };
    ctx.push(Value::literal(Object::Int(i)))?;
    Ok(Flow::Ok)
}

fn op_cvr(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let r = match v.object {
        Object::Int(i) => f64::from(i),
        Object::Real(r) => r,
        Object::String(r, view) => {
            let bytes = ctx.vm.get(r).and_then(Backing::as_string).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "cvr"))?;
            let text = std::str::from_utf8(&bytes[view.offset..view.offset + view.length])
                .map_err(|_| Error::new(ErrorKind::SyntaxError, "cvr"))?;
            text.trim().parse::<f64>().map_err(|_| Error::new(ErrorKind::SyntaxError, "cvr"))?
        }
        _ => return Err(Error::new(ErrorKind::TypeCheck, "cvr")),
    };
    ctx.push(Value::literal(Object::Real(r)))?;
    Ok(Flow::Ok)
}

fn op_cvs(ctx: &mut Context) -> Result<Flow, Error> {
    let dest = ctx.pop()?;
    let src = ctx.pop()?;
    let Object::String(r, view) = dest.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "cvs"));
    };
    let text = match &src.object {
        Object::Int(i) => i.to_string(),
        Object::Real(real) => format!("{real}"),
        Object::Bool(b) => b.to_string(),
        Object::Name(n) => String::from_utf8_lossy(n.as_bytes()).into_owned(),
        Object::Operator(_) => "--operator--".to_string(),
        Object::Null => "null".to_string(),
        _ => return Err(Error::new(ErrorKind::TypeCheck, "cvs")),
    };
    let bytes = text.as_bytes();
    if bytes.len() > view.length {
        return Err(Error::new(ErrorKind::RangeCheck, "cvs"));
    }
    let Some(s) = ctx.vm.get_mut(r).and_then(Backing::as_string_mut) else {
        return Err(Error::new(ErrorKind::TypeCheck, "cvs"));
    };
    s[view.offset..view.offset + bytes.len()].copy_from_slice(bytes);
    ctx.push(Value::literal(Object::String(r, View { offset: view.offset, length: bytes.len() })))?;
    Ok(Flow::Ok)
}

fn op_cvn(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let Object::String(r, view) = v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "cvn"));
    };
    let bytes = ctx.vm.get(r).and_then(Backing::as_string).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "cvn"))?;
    let name = Name::new(&bytes[view.offset..view.offset + view.length]);
    ctx.push(Value::literal(Object::Name(name)))?;
    Ok(Flow::Ok)
}

fn op_type(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let name = v.object.type_name();
    ctx.push(Value::literal(Object::Name(Name::new(name.as_bytes()))))?;
    Ok(Flow::Ok)
}

fn op_xcheck(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    ctx.push(Value::literal(Object::Bool(v.is_executable())))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"cvi", op_cvi);
    ctx.register(b"cvr", op_cvr);
    ctx.register(b"cvs", op_cvs);
    ctx.register(b"cvn", op_cvn);
    ctx.register(b"type", op_type);
    ctx.register(b"xcheck", op_xcheck);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cvi_truncates_real() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Real(3.9))).unwrap();
        op_cvi(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Int(3) => {}
            other => panic!("expected Int(3), got {other:?}"),
        }
    }

    #[test]
    fn type_reports_integertype() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(1))).unwrap();
        op_type(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Name(n) if n.as_bytes() == b"integertype" => {}
            other => panic!("expected integertype, got {other:?}"),
        }
    }

    #[test]
    fn xcheck_reflects_executable_attribute() {
        let mut ctx = Context::new();
        ctx.push(Value::executable(Object::Name(Name::new(b"foo")))).unwrap();
        op_xcheck(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
    }
}
