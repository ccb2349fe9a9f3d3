//! VM and job-control operators: `save`/`restore`, `gsave`/`grestore`/
//! `grestoreall`, `currentglobal`/`setglobal`/`gcheck`, `vmstatus`,
//! `startjob`/`exitserver`.
//!
//! Grounded on `operators/vm.py` and `operators/job_control.py`.

use crate::error::{Error, ErrorKind};
use crate::object::{Object, Value};
use crate::stack::{Context, Flow};
use crate::vm::Backing;

fn op_save(ctx: &mut Context) -> Result<Flow, Error> {
    let obj = ctx.save();
    ctx.push(Value::literal(obj))?;
    Ok(Flow::Ok)
}

fn op_restore(ctx: &mut Context) -> Result<Flow, Error> {
    // Peek, not pop: an invalidrestore must leave the operand stack
    // exactly as it was, save object included.
    let v = ctx.top().ok_or_else(|| Error::new(ErrorKind::StackUnderflow, "restore"))?.clone();
    ctx.restore(&v.object)?;
    ctx.pop()?;
    Ok(Flow::Ok)
}

fn op_gsave(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.gsave();
    Ok(Flow::Ok)
}

fn op_grestore(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.grestore()?;
    Ok(Flow::Ok)
}

fn op_grestoreall(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.grestoreall();
    Ok(Flow::Ok)
}

fn op_currentglobal(ctx: &mut Context) -> Result<Flow, Error> {
    let g = ctx.vm_alloc_mode_is_global;
    ctx.push(Value::literal(Object::Bool(g)))?;
    Ok(Flow::Ok)
}

fn op_setglobal(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    let Object::Bool(b) = v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "setglobal"));
    };
    ctx.vm_alloc_mode_is_global = b;
    Ok(Flow::Ok)
}

fn op_gcheck(ctx: &mut Context) -> Result<Flow, Error> {
    let v = ctx.pop()?;
    // Ghostscript-idiomatic deviation from a literal PLRM reading: a
    // simple (non-composite) object has no VM of its own, so it reads
    // as global rather than raising the question at all.
    let is_global = v.object.vm_origin().map(|o| o == crate::object::VmOrigin::Global).unwrap_or(true);
    ctx.push(Value::literal(Object::Bool(is_global)))?;
    Ok(Flow::Ok)
}

fn op_vmstatus(ctx: &mut Context) -> Result<Flow, Error> {
    let (level, used, max) = ctx.vm.status();
    ctx.push(Value::literal(Object::Int(level as i32)))?;
    ctx.push(Value::literal(Object::Int(used as i32)))?;
    ctx.push(Value::literal(Object::Int(max.min(i32::MAX as usize) as i32)))?;
    Ok(Flow::Ok)
}

/// Reads a `startjob`/`exitserver` password operand (int or string) into
/// bytes comparable against [`crate::stack::SystemParams::start_job_password`].
fn password_bytes(ctx: &Context, v: &Value, op_name: &'static str) -> Result<Vec<u8>, Error> {
    match v.object {
        Object::Int(i) => Ok(i.to_string().into_bytes()),
        Object::String(r, view) => {
            let s = ctx.vm.get(r).and_then(Backing::as_string).ok_or_else(|| Error::new(ErrorKind::TypeCheck, op_name))?;
            Ok(s[view.offset..view.offset + view.length].to_vec())
        }
        _ => Err(Error::new(ErrorKind::TypeCheck, op_name)),
    }
}

/// Ends the current job (clears O/D stacks, restores VM if the job was
/// encapsulated) and begins a new one, per PLRM 3.7.7. The execution
/// stack is stashed around the restore: it still holds the remainder of
/// the program that called `startjob`, which would otherwise trip the
/// same post-save invalidrestore check a user-level `restore` enforces.
fn run_job_server_sequence(ctx: &mut Context, persistent: bool) {
    ctx.operand.clear();
    while ctx.dicts.len() > 3 {
        ctx.dicts.pop();
    }
    if let Some(save_obj) = ctx.job_save.take() {
        let saved_exec = std::mem::take(&mut ctx.exec);
        let _ = ctx.restore(&save_obj);
        ctx.exec = saved_exec;
    }
    ctx.vm_alloc_mode_is_global = false;
    ctx.job_save = if persistent { None } else { Some(ctx.save()) };
    ctx.job_start_save_level = ctx.vm.status().0;
}

fn op_startjob(ctx: &mut Context) -> Result<Flow, Error> {
    if ctx.operand.len() < 2 {
        return Err(Error::new(ErrorKind::StackUnderflow, "startjob"));
    }
    let n = ctx.operand.len();
    let password = ctx.operand[n - 1].clone();
    let persistent_v = ctx.operand[n - 2].clone();
    let password_bytes = password_bytes(ctx, &password, "startjob")?;
    let Object::Bool(persistent) = persistent_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "startjob"));
    };

    let password_correct = password_bytes == ctx.system_params.start_job_password;
    let save_level_valid = ctx.vm.status().0 == ctx.job_start_save_level;
    let success = password_correct && save_level_valid;

    ctx.operand.truncate(n - 2);
    if success {
        run_job_server_sequence(ctx, persistent);
    }
    ctx.push(Value::literal(Object::Bool(success)))?;
    Ok(Flow::Ok)
}

/// `exitserver` is `true password startjob not { invalidaccess } if`,
/// plus the permanent-change notice PLRM has it print on success.
fn op_exitserver(ctx: &mut Context) -> Result<Flow, Error> {
    let password = ctx.top().ok_or_else(|| Error::new(ErrorKind::StackUnderflow, "exitserver"))?.clone();
    let password_bytes = password_bytes(ctx, &password, "exitserver")?;
    if password_bytes != ctx.system_params.start_job_password {
        return Err(Error::new(ErrorKind::InvalidAccess, "exitserver"));
    }
    ctx.pop()?;
    ctx.push(Value::literal(Object::Bool(true)))?;
    ctx.push(password)?;
    op_startjob(ctx)?;
    let Object::Bool(success) = ctx.pop()?.object else {
        unreachable!("startjob always pushes a bool")
    };
    if !success {
        return Err(Error::new(ErrorKind::InvalidAccess, "exitserver"));
    }
    log::info!("%%[exitserver: permanent state may be changed]%%");
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"save", op_save);
    ctx.register(b"restore", op_restore);
    ctx.register(b"gsave", op_gsave);
    ctx.register(b"grestore", op_grestore);
    ctx.register(b"grestoreall", op_grestoreall);
    ctx.register(b"currentglobal", op_currentglobal);
    ctx.register(b"setglobal", op_setglobal);
    ctx.register(b"gcheck", op_gcheck);
    ctx.register(b"vmstatus", op_vmstatus);
    ctx.register(b"startjob", op_startjob);
    ctx.register(b"exitserver", op_exitserver);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_restore_round_trips_operand_stack() {
        let mut ctx = Context::new();
        op_save(&mut ctx).unwrap();
        assert_eq!(ctx.operand.len(), 1);
        op_restore(&mut ctx).unwrap();
        assert_eq!(ctx.operand.len(), 0);
    }

    #[test]
    fn invalid_restore_leaves_operand_stack_untouched() {
        use crate::object::View;
        use crate::vm::Backing;

        let mut ctx = Context::new();
        op_save(&mut ctx).unwrap();
        let save_obj = ctx.top().unwrap().clone();

        let origin = ctx.alloc_origin();
        let r = ctx.vm.alloc(origin, Backing::Array(vec![Value::literal(Object::Int(1))]));
        ctx.push(Value::literal(Object::Array(r, View { offset: 0, length: 1 }))).unwrap();
        ctx.push(save_obj).unwrap();

        let before = ctx.operand.len();
        assert!(op_restore(&mut ctx).is_err());
        assert_eq!(ctx.operand.len(), before);
    }

    #[test]
    fn setglobal_then_currentglobal_round_trips() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Bool(true))).unwrap();
        op_setglobal(&mut ctx).unwrap();
        op_currentglobal(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
    }

    #[test]
    fn startjob_with_default_password_succeeds_and_pushes_true() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Bool(false))).unwrap();
        ctx.push(Value::literal(Object::Int(0))).unwrap();
        op_startjob(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
        assert!(ctx.job_save.is_some());
    }

    #[test]
    fn startjob_with_wrong_password_fails_and_pushes_false() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Bool(false))).unwrap();
        ctx.push(Value::literal(Object::Int(1))).unwrap();
        op_startjob(&mut ctx).unwrap();
        match ctx.pop().unwrap().object {
            Object::Bool(false) => {}
            other => panic!("expected false, got {other:?}"),
        }
        assert!(ctx.job_save.is_none());
    }

    #[test]
    fn exitserver_with_correct_password_consumes_it_and_leaves_a_job_save() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(0))).unwrap();
        op_exitserver(&mut ctx).unwrap();
        assert_eq!(ctx.operand.len(), 0);
        assert!(ctx.job_save.is_some());
    }

    #[test]
    fn exitserver_with_wrong_password_raises_invalidaccess() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(1))).unwrap();
        let err = op_exitserver(&mut ctx).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidAccess);
    }
}
