//! Operand/execution/dictionary/graphics stacks and the evaluator loop.
//!
//! Grounded on `core/stack.py` and `core/interpreter.py`: the evaluator is
//! a loop over the execution stack (E) with no host-language recursion —
//! procedure bodies and loops are records, not native iteration. Operator
//! dispatch lives outside this module (`operators::install`); this module
//! only owns the stacks, the graphics-state stack, and the main loop.

use std::collections::HashMap;
use std::time::Instant;

use log::{trace, warn};

use crate::dict::{Dict, DictKey};
use crate::display_list::DisplayList;
use crate::error::{Error, ErrorKind};
use crate::object::{CompositeRef, Name, Object, OperatorId, Value, VmOrigin, View};
use crate::path::{Matrix, Path, Segment};
use crate::stroke::{LineCap, LineJoin};
use crate::tokenizer::{self, NameLookup, TokenOutcome};
use crate::vm::{Backing, Vm};

/// What an operator implementation asks the evaluator to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep executing.
    Ok,
    /// `stop`: unwind to the nearest `stopped` boundary.
    Stop,
    /// `exit`: unwind to the nearest loop record.
    Exit,
}

pub type OperatorFn = fn(&mut Context) -> Result<Flow, Error>;

/// Bounded sizes read from `setuserparams`/`setsystemparams`
/// (`operators/interpreter_params.py`).
#[derive(Debug, Clone)]
pub struct UserParams {
    pub max_op_stack: usize,
    pub max_dict_stack: usize,
    pub max_exec_stack: usize,
    pub max_string_length: usize,
    pub max_name_length: usize,
}

impl Default for UserParams {
    fn default() -> Self {
        Self {
            max_op_stack: 500,
            max_dict_stack: 20,
            max_exec_stack: 250,
            max_string_length: 65535,
            max_name_length: 127,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemParams {
    pub max_font_cache: usize,
    pub build_time: u64,
    /// `StartJobPassword`: the password `startjob`/`exitserver` compare
    /// their operand against. PLRM's default is the integer `0`.
    pub start_job_password: Vec<u8>,
}

impl Default for SystemParams {
    fn default() -> Self {
        Self { max_font_cache: 0, build_time: 0, start_job_password: b"0".to_vec() }
    }
}

/// Flat color value. The color-space tag a setter used is kept alongside
/// so `currentcolorspace`/`currentgray`/etc. can answer without guessing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
    Hsb(f64, f64, f64),
}

impl Default for Color {
    fn default() -> Self {
        Color::Gray(0.0)
    }
}

/// One level of the graphics-state stack.
#[derive(Debug, Clone)]
pub struct GState {
    pub ctm: Matrix,
    pub path: Path,
    pub clip: Option<Path>,
    pub color: Color,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub dash_array: Vec<f64>,
    pub dash_offset: f64,
    pub flatness: f64,
    pub stroke_adjust: bool,
    /// Set on the copy pushed by `save`, so `restore`'s implicit
    /// `grestoreall` knows where to stop popping.
    pub saved: bool,
}

impl Default for GState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            path: Path::new(),
            clip: None,
            color: Color::default(),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash_array: Vec::new(),
            dash_offset: 0.0,
            flatness: 1.0,
            stroke_adjust: false,
            saved: false,
        }
    }
}

/// Explicit loop-control record: loops are encoded as records pushed
/// onto the execution stack rather than run via host recursion.
#[derive(Debug, Clone)]
pub enum LoopRecord {
    For { current: f64, limit: f64, increment: f64, proc: Value },
    Repeat { remaining: u64, proc: Value },
    Loop { proc: Value },
    Forall { container: CompositeRef, origin: VmOrigin, view: View, index: usize, proc: Value, is_dict: bool },
    /// `pathforall`: the current path's segments, already transformed to
    /// user space, walked in order against four procedures picked by
    /// segment kind. `Path` has no VM arena ref to re-borrow per step
    /// (unlike `Forall`'s array/dict), so the walk is snapshotted once.
    PathForall { segments: std::rc::Rc<[Segment]>, index: usize, moveproc: Value, lineproc: Value, curveproc: Value, closeproc: Value },
}

/// One item on the execution stack.
pub enum ExecItem {
    /// A single object to run through the main dispatch algorithm.
    Obj(Value),
    /// An executable array mid-iteration; `index` is the cursor.
    ArrayIter { container: CompositeRef, origin: VmOrigin, view: View, index: usize },
    /// A file left on E so the tokeniser is re-entered for the next token.
    File(Box<dyn crate::bytestream::ByteSource>),
    Loop(LoopRecord),
    /// `stopped`'s catch boundary.
    StoppedBoundary,
}

/// The evaluator state for one execution context: each context has
/// independent O/E/D/graphics-state stacks and local VM, and shares
/// global VM with any others.
pub struct Context {
    pub vm: Vm,
    pub operand: Vec<Value>,
    pub exec: Vec<ExecItem>,
    /// Dictionary stack. Index 0..=2 are the three permanent dictionaries
    /// (systemdict, globaldict, userdict) and can never be popped.
    pub dicts: Vec<CompositeRef>,
    pub gstate: Vec<GState>,
    /// `{` / `}` nesting depth; while > 0 the evaluator defers execution.
    pub proc_count: u32,
    pub user_params: UserParams,
    pub system_params: SystemParams,
    pub vm_alloc_mode_is_global: bool,
    pub dispatch: HashMap<OperatorId, OperatorFn>,
    next_operator_id: u32,
    pub quit_code: Option<i32>,
    pub display_list: DisplayList,
    /// Reference point for `usertime`/`realtime`; this context's own
    /// clock, not wall time, since neither operator has a defined
    /// meaning in terms of calendar time (PLRM).
    pub start_time: Instant,
    /// The save boundary the current job started with, if it is
    /// encapsulated. `None` for an unencapsulated job (the initial job,
    /// or one entered via `startjob`/`exitserver` with `persistent` true).
    pub job_save: Option<Object>,
    /// Save nesting depth at which the current job started; `startjob`
    /// only succeeds when the depth matches this again.
    pub job_start_save_level: usize,
}

/// Implements [`NameLookup`] over a borrowed dictionary-stack snapshot
/// without holding `vm` itself, so the tokeniser can borrow `vm`
/// mutably (for allocation) and `dicts` immutably (for `//name`
/// resolution) at the same time, both reborrowed from the same
/// `Context`.
struct DictLookup<'a> {
    dicts: &'a [CompositeRef],
}

impl NameLookup for DictLookup<'_> {
    fn lookup(&mut self, vm: &Vm, name: &Name) -> Option<Value> {
        let key = DictKey::Name(name.clone());
        for &d in self.dicts.iter().rev() {
            let Some(Backing::Dict(dict)) = vm.get(d) else { continue };
            if let Some(v) = dict.get(&key) {
                return Some(v.clone());
            }
        }
        None
    }
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        let mut vm = Vm::new();
        let system = vm.alloc(VmOrigin::Global, Backing::Dict(Dict::new(400)));
        let global = vm.alloc(VmOrigin::Global, Backing::Dict(Dict::new(64)));
        let user = vm.alloc(VmOrigin::Local, Backing::Dict(Dict::new(200)));
        let mut ctx = Self {
            vm,
            operand: Vec::new(),
            exec: Vec::new(),
            dicts: vec![system, global, user],
            gstate: vec![GState::default()],
            proc_count: 0,
            user_params: UserParams::default(),
            system_params: SystemParams::default(),
            vm_alloc_mode_is_global: false,
            dispatch: HashMap::new(),
            next_operator_id: 0,
            quit_code: None,
            display_list: DisplayList::new(),
            start_time: Instant::now(),
            job_save: None,
            job_start_save_level: 0,
        };
        ctx.install_default_errordict();
        ctx.install_literal_constants();
        ctx
    }

    /// `true`, `false` and `null` are ordinary systemdict entries holding
    /// literal (non-executable) objects, not operators; every other name
    /// token reaches its value through dispatch, but these three are
    /// constants a program can shadow in a local dict exactly like any
    /// other binding. `systemdict`/`globaldict`/`userdict` are the same
    /// idea applied to the three permanent dictionaries themselves, so a
    /// program can do `systemdict /foo known` without `foo` already being
    /// reachable by ordinary lookup.
    fn install_literal_constants(&mut self) {
        let entries = [
            (Name::new(b"true"), Value::literal(Object::Bool(true))),
            (Name::new(b"false"), Value::literal(Object::Bool(false))),
            (Name::new(b"null"), Value::literal(Object::Null)),
            (Name::new(b"systemdict"), Value::literal(Object::Dict(self.dicts[0]))),
            (Name::new(b"globaldict"), Value::literal(Object::Dict(self.dicts[1]))),
            (Name::new(b"userdict"), Value::literal(Object::Dict(self.dicts[2]))),
        ];
        if let Some(Backing::Dict(sys)) = self.vm.get_mut(self.systemdict()) {
            for (name, value) in entries {
                sys.insert(DictKey::Name(name), value);
            }
        }
    }

    /// Bind every taxonomy member in `errordict` to a shared default
    /// handler that logs the offending operator and returns control to
    /// the evaluator, the way PLRM's own `handleerror` procedures do
    /// little more than report and fall through to `stop`. A program
    /// may replace any (or all) of these bindings; lookup in
    /// [`Context::dispatch_error`] is always dynamic.
    fn install_default_errordict(&mut self) {
        let id = OperatorId(self.next_operator_id);
        self.next_operator_id += 1;
        self.dispatch.insert(id, default_error_handler as OperatorFn);
        let handler = Value::executable(Object::Operator(id));

        let mut errordict = Dict::new(32);
        for raw in 0u8..=26 {
            if let Ok(kind) = ErrorKind::try_from(raw) {
                errordict.insert(DictKey::Name(Name::new(kind.name())), handler.clone());
            }
        }
        let r = self.vm.alloc(VmOrigin::Global, Backing::Dict(errordict));
        if let Some(Backing::Dict(sys)) = self.vm.get_mut(self.systemdict()) {
            sys.insert(DictKey::Name(Name::new(b"errordict")), Value::literal(Object::Dict(r)));
        }
    }

    #[must_use]
    pub fn systemdict(&self) -> CompositeRef {
        self.dicts[0]
    }

    #[must_use]
    pub fn gs(&self) -> &GState {
        self.gstate.last().expect("graphics state stack is never empty")
    }

    pub fn gs_mut(&mut self) -> &mut GState {
        self.gstate.last_mut().expect("graphics state stack is never empty")
    }

    /// Register a native operator under `name` in systemdict, returning
    /// its freshly allocated id. Called by `operators::install`.
    pub fn register(&mut self, name: &[u8], f: OperatorFn) {
        let id = OperatorId(self.next_operator_id);
        self.next_operator_id += 1;
        self.dispatch.insert(id, f);
        let key = DictKey::Name(Name::new(name));
        let value = Value::executable(Object::Operator(id));
        if let Some(Backing::Dict(d)) = self.vm.get_mut(self.systemdict()) {
            d.insert(key, value);
        }
    }

    // --- Operand stack -------------------------------------------------

    pub fn push(&mut self, v: Value) -> Result<(), Error> {
        if self.operand.len() >= self.user_params.max_op_stack {
            return Err(Error::new(ErrorKind::StackOverflow, "--push--"));
        }
        self.operand.push(v);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, Error> {
        self.operand.pop().ok_or_else(|| Error::new(ErrorKind::StackUnderflow, "--pop--"))
    }

    #[must_use]
    pub fn top(&self) -> Option<&Value> {
        self.operand.last()
    }

    // --- Dictionary stack ------------------------------------------------

    pub fn begin(&mut self, d: CompositeRef) -> Result<(), Error> {
        if self.dicts.len() >= self.user_params.max_dict_stack {
            return Err(Error::new(ErrorKind::DictStackOverflow, "begin"));
        }
        self.dicts.push(d);
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), Error> {
        if self.dicts.len() <= 3 {
            return Err(Error::new(ErrorKind::DictStackUnderflow, "end"));
        }
        self.dicts.pop();
        Ok(())
    }

    /// Top-down name lookup through the dictionary stack, skipping
    /// dictionaries whose access has been lowered below read-only.
    #[must_use]
    pub fn lookup_name(&self, name: &Name) -> Option<Value> {
        let key = DictKey::Name(name.clone());
        for &d in self.dicts.iter().rev() {
            let Some(Backing::Dict(dict)) = self.vm.get(d) else { continue };
            if let Some(v) = dict.get(&key) {
                return Some(v.clone());
            }
        }
        None
    }

    /// `where`: which dictionary (if any) defines `name`.
    #[must_use]
    pub fn where_defined(&self, name: &Name) -> Option<CompositeRef> {
        let key = DictKey::Name(name.clone());
        for &d in self.dicts.iter().rev() {
            let Some(Backing::Dict(dict)) = self.vm.get(d) else { continue };
            if dict.contains(&key) {
                return Some(d);
            }
        }
        None
    }

    // --- VM origin / allocation -----------------------------------------

    #[must_use]
    pub fn alloc_origin(&self) -> VmOrigin {
        if self.vm_alloc_mode_is_global { VmOrigin::Global } else { VmOrigin::Local }
    }

    // --- save/restore / gsave/grestore ------------------------------------

    /// `save`. `job_level` is true only when this is the outermost save
    /// (no save currently active).
    pub fn save(&mut self) -> Object {
        let job_level = self.vm.status().0 == 0;
        let id = self.vm.save(job_level);
        let mut g = self.gs().clone();
        g.saved = true;
        self.gstate.push(g);
        Object::Save(crate::object::SaveId(id.0))
    }

    /// `restore`. Validates the save is active, scans O/E/D-stack-above-
    /// permanent-three for post-save local composites (`invalidrestore`),
    /// then reverts VM state and performs an implicit `grestoreall`.
    pub fn restore(&mut self, save_obj: &Object) -> Result<(), Error> {
        let Object::Save(id) = save_obj else {
            return Err(Error::new(ErrorKind::TypeCheck, "restore"));
        };
        let vm_id = crate::vm::SaveId(id.0);
        let Some(record) = self.vm.save_record(vm_id) else {
            return Err(Error::new(ErrorKind::InvalidRestore, "restore"));
        };

        for v in &self.operand {
            if self.is_invalid_after(v, record.created) {
                return Err(Error::new(ErrorKind::InvalidRestore, "restore"));
            }
        }
        for e in &self.exec {
            if let ExecItem::Obj(v) = e {
                if self.is_invalid_after(v, record.created) {
                    return Err(Error::new(ErrorKind::InvalidRestore, "restore"));
                }
            }
        }
        for &d in self.dicts.iter().skip(3) {
            if d.origin == VmOrigin::Local && d.timestamp > record.created {
                return Err(Error::new(ErrorKind::InvalidRestore, "restore"));
            }
        }

        let created = self.vm.restore(vm_id).ok_or_else(|| Error::new(ErrorKind::InvalidRestore, "restore"))?;
        while self.gstate.len() > 1 {
            let saved = self.gs().saved;
            if saved {
                break;
            }
            self.gstate.pop();
        }
        if self.gstate.len() > 1 {
            self.gstate.pop();
        }
        trace!("restore reverted VM to created<={created}");
        Ok(())
    }

    fn is_invalid_after(&self, v: &Value, created: u64) -> bool {
        match v.object.composite_ref() {
            Some(r) => r.origin == VmOrigin::Local && r.timestamp > created,
            None => false,
        }
    }

    pub fn gsave(&mut self) {
        let g = self.gs().clone();
        self.gstate.push(g);
    }

    pub fn grestore(&mut self) -> Result<(), Error> {
        if self.gstate.len() <= 1 || self.gs().saved {
            return Err(Error::new(ErrorKind::StackUnderflow, "grestore"));
        }
        self.gstate.pop();
        Ok(())
    }

    pub fn grestoreall(&mut self) {
        while self.gstate.len() > 1 && !self.gs().saved {
            self.gstate.pop();
        }
    }

    // --- execution loop --------------------------------------------------

    /// Push an already-tokenised value for execution, starting the main
    /// loop's dispatch algorithm on it next iteration.
    pub fn push_exec(&mut self, v: Value) -> Result<(), Error> {
        if self.exec.len() >= self.user_params.max_exec_stack {
            return Err(Error::new(ErrorKind::ExecStackOverflow, "--exec--"));
        }
        self.exec.push(ExecItem::Obj(v));
        Ok(())
    }

    /// Run the evaluator to completion (E empty) or until a fatal,
    /// unhandled error is encountered.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            if self.quit_code.is_some() {
                return Ok(());
            }
            let Some(item) = self.exec.pop() else { return Ok(()) };
            if let Err(e) = self.step(item) {
                self.dispatch_error(e)?;
            }
        }
    }

    fn step(&mut self, item: ExecItem) -> Result<(), Error> {
        match item {
            ExecItem::StoppedBoundary => Ok(()),
            ExecItem::Loop(record) => self.step_loop(record),
            ExecItem::File(mut src) => {
                let origin = self.alloc_origin();
                let mut dict_lookup = DictLookup { dicts: &self.dicts };
                let outcome = tokenizer::read_token(src.as_mut(), &mut self.vm, origin, &mut dict_lookup);
                match outcome? {
                    TokenOutcome::Eof => Ok(()),
                    TokenOutcome::OpenProc => {
                        self.proc_count += 1;
                        self.exec.push(ExecItem::File(src));
                        self.push(Value::literal(Object::Mark))
                    }
                    TokenOutcome::CloseProc => {
                        self.proc_count = self.proc_count.saturating_sub(1);
                        self.exec.push(ExecItem::File(src));
                        self.close_procedure()
                    }
                    TokenOutcome::Value(v) => {
                        self.exec.push(ExecItem::File(src));
                        self.dispatch_value(v)
                    }
                }
            }
            ExecItem::ArrayIter { container, origin, view, index } => {
                let Some(Backing::Array(arr)) = self.vm.get(CompositeRef { timestamp: container.timestamp, origin }) else {
                    return Ok(());
                };
                if index >= view.length {
                    return Ok(());
                }
                let v = arr[view.offset + index].clone();
                self.exec.push(ExecItem::ArrayIter { container, origin, view, index: index + 1 });
                self.dispatch_value(v)
            }
            ExecItem::Obj(v) => self.dispatch_value(v),
        }
    }

    /// Build an executable array from everything above the mark the
    /// matching `{` pushed (PLRM procedure-literal syntax), mirroring
    /// `]`'s literal-array construction in `operators/array.rs`.
    fn close_procedure(&mut self) -> Result<(), Error> {
        let pos = self
            .operand
            .iter()
            .rposition(|v| matches!(v.object, Object::Mark))
            .ok_or_else(|| Error::new(ErrorKind::SyntaxError, "--}--"))?;
        let elements: Vec<Value> = self.operand.split_off(pos + 1);
        self.operand.pop();
        let origin = self.alloc_origin();
        let len = elements.len();
        let r = self.vm.alloc(origin, Backing::Array(elements));
        self.push(Value::executable(Object::Array(r, View { offset: 0, length: len })))
    }

    /// `[` and `]` build arrays immediately during scanning, the same as
    /// nested `{`/`}`, even while accumulating an enclosing procedure's
    /// literal text; every other name token is left un-executed there.
    fn is_bracket_name(v: &Value) -> bool {
        v.is_executable() && matches!(&v.object, Object::Name(n) if n.as_bytes() == b"[" || n.as_bytes() == b"]")
    }

    fn dispatch_value(&mut self, v: Value) -> Result<(), Error> {
        if self.proc_count > 0 && !Self::is_bracket_name(&v) {
            self.push(v)?;
            return Ok(());
        }
        if !v.is_executable() {
            return self.push(v);
        }
        match &v.object {
            Object::Name(name) => {
                let Some(bound) = self.lookup_name(name) else {
                    return Err(Error::new(ErrorKind::Undefined, "--exec--"));
                };
                self.invoke(bound)
            }
            Object::Operator(id) => self.invoke_operator(*id),
            Object::Array(r, view) => {
                self.exec.push(ExecItem::ArrayIter { container: *r, origin: r.origin, view: *view, index: 0 });
                Ok(())
            }
            Object::File(_) => Ok(()),
            _ => self.push(v),
        }
    }

    /// Execute a value obtained from name lookup or a loop-record body:
    /// operators run immediately, everything else re-enters dispatch.
    fn invoke(&mut self, v: Value) -> Result<(), Error> {
        if let Object::Operator(id) = v.object {
            return self.invoke_operator(id);
        }
        if self.exec.len() >= self.user_params.max_exec_stack {
            return Err(Error::new(ErrorKind::ExecStackOverflow, "--exec--"));
        }
        self.exec.push(ExecItem::Obj(v));
        Ok(())
    }

    fn invoke_operator(&mut self, id: OperatorId) -> Result<(), Error> {
        let Some(f) = self.dispatch.get(&id).copied() else {
            return Err(Error::new(ErrorKind::Undefined, "--exec--"));
        };
        match f(self) {
            Ok(Flow::Ok) => Ok(()),
            Ok(Flow::Stop) => {
                self.unwind_to_stopped(true);
                Ok(())
            }
            Ok(Flow::Exit) => self.unwind_to_loop(),
            Err(e) => Err(e),
        }
    }

    fn step_loop(&mut self, record: LoopRecord) -> Result<(), Error> {
        match record {
            LoopRecord::For { current, limit, increment, proc } => {
                let continues = if increment >= 0.0 { current <= limit } else { current >= limit };
                if !continues {
                    return Ok(());
                }
                let next = LoopRecord::For { current: current + increment, limit, increment, proc: proc.clone() };
                self.exec.push(ExecItem::Loop(next));
                let num = if current.fract() == 0.0 && current.abs() < i32::MAX as f64 {
                    Object::Int(current as i32)
                } else {
                    Object::Real(current)
                };
                self.push(Value::literal(num))?;
                self.invoke(proc)
            }
            LoopRecord::Repeat { remaining, proc } => {
                if remaining == 0 {
                    return Ok(());
                }
                self.exec.push(ExecItem::Loop(LoopRecord::Repeat { remaining: remaining - 1, proc: proc.clone() }));
                self.invoke(proc)
            }
            LoopRecord::Loop { proc } => {
                self.exec.push(ExecItem::Loop(LoopRecord::Loop { proc: proc.clone() }));
                self.invoke(proc)
            }
            LoopRecord::Forall { container, origin, view, index, proc, is_dict } => {
                if is_dict {
                    let Some(Backing::Dict(d)) = self.vm.get(CompositeRef { timestamp: container.timestamp, origin }) else {
                        return Ok(());
                    };
                    let entries: Vec<(DictKey, Value)> = d.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    let Some((key, value)) = entries.get(index).cloned() else { return Ok(()) };
                    self.exec.push(ExecItem::Loop(LoopRecord::Forall {
                        container,
                        origin,
                        view,
                        index: index + 1,
                        proc: proc.clone(),
                        is_dict,
                    }));
                    let key_obj = match key {
                        DictKey::Name(n) => Object::Name(n),
                        DictKey::Int(i) => Object::Int(i),
                        DictKey::Real(bits) => Object::Real(f64::from_bits(bits)),
                        DictKey::Bool(b) => Object::Bool(b),
                    };
                    self.push(Value::literal(key_obj))?;
                    self.push(value)?;
                    self.invoke(proc)
                } else {
                    if index >= view.length {
                        return Ok(());
                    }
                    let Some(arr) = self.vm.get(CompositeRef { timestamp: container.timestamp, origin }).and_then(Backing::as_array) else {
                        return Ok(());
                    };
                    let element = arr[view.offset + index].clone();
                    self.exec.push(ExecItem::Loop(LoopRecord::Forall {
                        container,
                        origin,
                        view,
                        index: index + 1,
                        proc: proc.clone(),
                        is_dict,
                    }));
                    self.push(element)?;
                    self.invoke(proc)
                }
            }
            LoopRecord::PathForall { segments, index, moveproc, lineproc, curveproc, closeproc } => {
                let Some(seg) = segments.get(index).copied() else { return Ok(()) };
                self.exec.push(ExecItem::Loop(LoopRecord::PathForall {
                    segments: segments.clone(),
                    index: index + 1,
                    moveproc: moveproc.clone(),
                    lineproc: lineproc.clone(),
                    curveproc: curveproc.clone(),
                    closeproc: closeproc.clone(),
                }));
                match seg {
                    Segment::MoveTo(p) => {
                        self.push(Value::literal(Object::Real(p.x)))?;
                        self.push(Value::literal(Object::Real(p.y)))?;
                        self.invoke(moveproc)
                    }
                    Segment::LineTo(p) => {
                        self.push(Value::literal(Object::Real(p.x)))?;
                        self.push(Value::literal(Object::Real(p.y)))?;
                        self.invoke(lineproc)
                    }
                    Segment::CurveTo(c1, c2, p3) => {
                        for p in [c1, c2, p3] {
                            self.push(Value::literal(Object::Real(p.x)))?;
                            self.push(Value::literal(Object::Real(p.y)))?;
                        }
                        self.invoke(curveproc)
                    }
                    Segment::ClosePath => self.invoke(closeproc),
                }
            }
        }
    }

    fn unwind_to_loop(&mut self) -> Result<(), Error> {
        while let Some(item) = self.exec.pop() {
            if matches!(item, ExecItem::Loop(_)) {
                return Ok(());
            }
        }
        Err(Error::new(ErrorKind::InvalidExit, "exit"))
    }

    fn unwind_to_stopped(&mut self, push_true: bool) {
        while let Some(item) = self.exec.pop() {
            if matches!(item, ExecItem::StoppedBoundary) {
                if push_true {
                    let _ = self.push(Value::literal(Object::Bool(true)));
                }
                return;
            }
        }
        warn!("stop/error with no enclosing stopped context; discarding");
    }

    /// `stopped`: run `proc`, catching both native errors and `stop`.
    /// Pushes `false` if it completed, `true` if caught.
    pub fn run_stopped(&mut self, proc: Value) -> Result<(), Error> {
        self.exec.push(ExecItem::StoppedBoundary);
        self.invoke(proc)?;
        // Drive the nested execution to the boundary before returning
        // control, since `stopped` must behave like a single operator.
        let boundary_depth = self
            .exec
            .iter()
            .rposition(|i| matches!(i, ExecItem::StoppedBoundary))
            .map_or(0, |p| p);
        while self.exec.len() > boundary_depth {
            let Some(item) = self.exec.pop() else { break };
            if matches!(item, ExecItem::StoppedBoundary) {
                self.push(Value::literal(Object::Bool(false)))?;
                return Ok(());
            }
            if let Err(e) = self.step(item) {
                // `dispatch_error` pushes `true` and unwinds to this same
                // boundary itself when one exists on E, which it always
                // does here; no separate push/return bookkeeping needed.
                return self.dispatch_error(e);
            }
        }
        self.push(Value::literal(Object::Bool(false)))
    }

    #[must_use]
    fn has_stopped_boundary(&self) -> bool {
        self.exec.iter().any(|i| matches!(i, ExecItem::StoppedBoundary))
    }

    /// Error dispatch: look up `errordict` dynamically
    /// (ordinary name lookup of `/errordict`), invoke the handler bound to
    /// the error's name with the offending operator's name on O, then
    /// unwind to the nearest `stopped` boundary if one exists. With no
    /// enclosing `stopped`, the error is fatal regardless of whether a
    /// handler ran.
    fn dispatch_error(&mut self, err: Error) -> Result<(), Error> {
        let name = Name::new(err.kind.name());
        let handler = Name::new(b"errordict")
            .pipe(|n| self.lookup_name(&n))
            .and_then(|v| v.object.composite_ref())
            .and_then(|r| self.vm.get(r).and_then(Backing::as_dict).cloned())
            .and_then(|d| d.get(&DictKey::Name(name)).cloned());

        match handler {
            Some(handler) => {
                let op_name = Value::literal(Object::Name(Name::new(err.operator.as_bytes())));
                let _ = self.push(op_name);
                let _ = self.invoke(handler);
            }
            None => warn!("unhandled error {err} (no errordict binding)"),
        }

        if self.has_stopped_boundary() {
            self.unwind_to_stopped(true);
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// Default `errordict` handler shared by every taxonomy member: reports
/// the offending operator and returns, letting `dispatch_error` unwind
/// to the nearest `stopped` (or propagate, with none enclosing).
fn default_error_handler(ctx: &mut Context) -> Result<Flow, Error> {
    if let Some(Value { object: Object::Name(n), .. }) = ctx.top() {
        log::error!("PostScript error in operator: {}", String::from_utf8_lossy(&n.0));
    }
    Ok(Flow::Ok)
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Small pipe-forward helper used once above to keep `dispatch_error`
/// linear instead of nesting `match`es.
trait Pipe: Sized {
    fn pipe<R>(self, f: impl FnOnce(Self) -> R) -> R {
        f(self)
    }
}
impl<T> Pipe for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Number;

    fn push_int(ctx: &mut Context, i: i32) {
        ctx.push(Value::literal(Object::Int(i))).unwrap();
    }

    #[test]
    fn operand_stack_overflow_raises() {
        let mut ctx = Context::new();
        ctx.user_params.max_op_stack = 2;
        push_int(&mut ctx, 1);
        push_int(&mut ctx, 2);
        assert!(ctx.push(Value::literal(Object::Int(3))).is_err());
    }

    #[test]
    fn name_lookup_walks_dict_stack_top_down() {
        let mut ctx = Context::new();
        let user_dict = ctx.dicts[2];
        if let Some(Backing::Dict(d)) = ctx.vm.get_mut(user_dict) {
            d.insert(DictKey::Name(Name::new(b"x")), Value::literal(Object::Int(42)));
        }
        let found = ctx.lookup_name(&Name::new(b"x")).unwrap();
        match found.object.as_number() {
            Some(Number::Int(42)) => {}
            other => panic!("expected Int(42), got {other:?}"),
        }
    }

    #[test]
    fn save_then_restore_reverts_without_mutation_visible() {
        let mut ctx = Context::new();
        let origin = ctx.alloc_origin();
        let r = ctx.vm.alloc(origin, Backing::Array(vec![Value::literal(Object::Int(1))]));
        let save_obj = ctx.save();
        if let Some(Backing::Array(a)) = ctx.vm.get_mut(r) {
            a[0] = Value::literal(Object::Int(99));
        }
        ctx.restore(&save_obj).unwrap();
        let Some(Backing::Array(a)) = ctx.vm.get(r) else { panic!("array vanished") };
        match a[0].object {
            Object::Int(1) => {}
            ref other => panic!("expected reverted Int(1), got {other:?}"),
        }
    }

    #[test]
    fn restore_after_already_restored_is_invalid() {
        let mut ctx = Context::new();
        let save_obj = ctx.save();
        ctx.restore(&save_obj).unwrap();
        assert!(ctx.restore(&save_obj).is_err());
    }

    #[test]
    fn exit_with_no_loop_is_invalid_exit() {
        let mut ctx = Context::new();
        assert!(ctx.unwind_to_loop().is_err());
    }

    fn run_source(src: &'static [u8]) -> Context {
        let mut ctx = Context::new();
        crate::operators::install(&mut ctx);
        ctx.exec.push(ExecItem::File(Box::new(crate::bytestream::SliceSource::new(src))));
        ctx.run().unwrap();
        ctx
    }

    #[test]
    fn procedure_literal_scans_into_a_single_executable_array() {
        let ctx = run_source(b"{ 1 2 add } pop");
        assert_eq!(ctx.operand.len(), 0);
    }

    #[test]
    fn if_with_scanned_procedure_literal_runs_its_body() {
        let mut ctx = run_source(b"true { 1 2 add } if");
        match ctx.pop().unwrap().object {
            Object::Int(3) => {}
            other => panic!("expected Int(3), got {other:?}"),
        }
    }

    #[test]
    fn bracket_array_literal_scans_into_a_literal_array_of_three() {
        let mut ctx = run_source(b"[ 1 2 3 ] length");
        match ctx.pop().unwrap().object {
            Object::Int(3) => {}
            other => panic!("expected Int(3), got {other:?}"),
        }
    }

    #[test]
    fn nested_procedure_literal_inside_array_builds_both() {
        let mut ctx = run_source(b"[ 1 { 2 3 add } 4 ] length");
        match ctx.pop().unwrap().object {
            Object::Int(3) => {}
            other => panic!("expected Int(3), got {other:?}"),
        }
    }

    #[test]
    fn systemdict_userdict_globaldict_are_reachable_by_name() {
        let mut ctx = run_source(b"userdict /greeting (hi) put userdict /greeting get");
        match ctx.pop().unwrap().object {
            Object::String(..) => {}
            other => panic!("expected a string, got {other:?}"),
        }
        let mut ctx2 = run_source(b"systemdict /add known");
        match ctx2.pop().unwrap().object {
            Object::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
    }
}
