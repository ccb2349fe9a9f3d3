//! Control-flow operators: `if`/`ifelse`, `for`/`repeat`/`loop`/`exit`,
//! `stopped`/`stop`, `exec`, `quit`.
//!
//! Grounded on `operators/control_flow.py` and `operators/job_control.py`
//! (`quit`). Loop bodies are pushed as [`LoopRecord`]s onto the execution
//! stack rather than run via host recursion (see `stack.rs`).

use super::{pop_bool, pop_number};
use crate::error::Error;
use crate::stack::{Context, ExecItem, Flow, LoopRecord};

fn op_if(ctx: &mut Context) -> Result<Flow, Error> {
    let proc = ctx.pop()?;
    let cond = pop_bool(ctx, "if")?;
    if cond {
        ctx.exec.push(ExecItem::Obj(proc));
    }
    Ok(Flow::Ok)
}

fn op_ifelse(ctx: &mut Context) -> Result<Flow, Error> {
    let else_proc = ctx.pop()?;
    let if_proc = ctx.pop()?;
    let cond = pop_bool(ctx, "ifelse")?;
    ctx.exec.push(ExecItem::Obj(if cond { if_proc } else { else_proc }));
    Ok(Flow::Ok)
}

fn op_for(ctx: &mut Context) -> Result<Flow, Error> {
    let proc = ctx.pop()?;
    let limit = pop_number(ctx, "for")?.as_f64();
    let increment = pop_number(ctx, "for")?.as_f64();
    let initial = pop_number(ctx, "for")?.as_f64();
    ctx.exec.push(ExecItem::Loop(LoopRecord::For { current: initial, limit, increment, proc }));
    Ok(Flow::Ok)
}

fn op_repeat(ctx: &mut Context) -> Result<Flow, Error> {
    let proc = ctx.pop()?;
    let n = super::pop_int(ctx, "repeat")?;
    if n < 0 {
        return Err(Error::new(crate::error::ErrorKind::RangeCheck, "repeat"));
    }
    ctx.exec.push(ExecItem::Loop(LoopRecord::Repeat { remaining: n as u64, proc }));
    Ok(Flow::Ok)
}

fn op_loop(ctx: &mut Context) -> Result<Flow, Error> {
    let proc = ctx.pop()?;
    ctx.exec.push(ExecItem::Loop(LoopRecord::Loop { proc }));
    Ok(Flow::Ok)
}

fn op_exit(_ctx: &mut Context) -> Result<Flow, Error> {
    Ok(Flow::Exit)
}

fn op_exec(ctx: &mut Context) -> Result<Flow, Error> {
    let proc = ctx.pop()?;
    ctx.exec.push(ExecItem::Obj(proc));
    Ok(Flow::Ok)
}

fn op_stopped(ctx: &mut Context) -> Result<Flow, Error> {
    let proc = ctx.pop()?;
    ctx.run_stopped(proc)?;
    Ok(Flow::Ok)
}

fn op_stop(_ctx: &mut Context) -> Result<Flow, Error> {
    Ok(Flow::Stop)
}

fn op_quit(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.quit_code = Some(0);
    Ok(Flow::Ok)
}

fn op_countexecstack(ctx: &mut Context) -> Result<Flow, Error> {
    ctx.push(crate::object::Value::literal(crate::object::Object::Int(ctx.exec.len() as i32)))?;
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"if", op_if);
    ctx.register(b"ifelse", op_ifelse);
    ctx.register(b"for", op_for);
    ctx.register(b"repeat", op_repeat);
    ctx.register(b"loop", op_loop);
    ctx.register(b"exit", op_exit);
    ctx.register(b"exec", op_exec);
    ctx.register(b"stopped", op_stopped);
    ctx.register(b"stop", op_stop);
    ctx.register(b"quit", op_quit);
    ctx.register(b"countexecstack", op_countexecstack);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Object, Value};

    #[test]
    fn if_true_pushes_proc_for_execution() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Bool(true))).unwrap();
        ctx.push(Value::executable(Object::Int(1))).unwrap();
        op_if(&mut ctx).unwrap();
        assert_eq!(ctx.exec.len(), 1);
    }

    #[test]
    fn if_false_discards_proc() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Bool(false))).unwrap();
        ctx.push(Value::executable(Object::Int(1))).unwrap();
        op_if(&mut ctx).unwrap();
        assert_eq!(ctx.exec.len(), 0);
    }

    #[test]
    fn stop_returns_flow_stop() {
        let mut ctx = Context::new();
        assert_eq!(op_stop(&mut ctx).unwrap(), Flow::Stop);
    }

    #[test]
    fn quit_sets_quit_code() {
        let mut ctx = Context::new();
        op_quit(&mut ctx).unwrap();
        assert_eq!(ctx.quit_code, Some(0));
    }
}
