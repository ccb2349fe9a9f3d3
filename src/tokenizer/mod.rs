//! Text and binary tokenisers.
//!
//! Grounded on `core/tokenizer.py` (text) and `core/binary_token.py`
//! (binary). Both produce one [`Value`] per call; `//name` resolution
//! and the binary object-sequence's immediately-evaluated names need a
//! dictionary-stack lookup, supplied by the caller as a closure so the
//! tokeniser itself stays decoupled from the evaluator's `Context`.

mod binary;
mod text;

use crate::bytestream::ByteSource;
use crate::error::{Error, ErrorKind};
use crate::object::{Name, Value, VmOrigin};
use crate::vm::Vm;

/// Looks up an immediately-evaluated name (`//name`) on the dictionary
/// stack. Returns `None` if undefined (a `undefined` error at the call
/// site, not here). `vm` is passed explicitly rather than captured by
/// the implementor, so the tokeniser can hold `&mut Vm` for allocation
/// and reborrow it immutably just for the lookup call.
pub trait NameLookup {
    fn lookup(&mut self, vm: &Vm, name: &Name) -> Option<Value>;
}

/// What one call to the tokeniser produced.
pub enum TokenOutcome {
    Value(Value),
    /// `{`: begin deferred procedure construction.
    OpenProc,
    /// `}`: end deferred procedure construction.
    CloseProc,
    Eof,
}

/// Read exactly one token from `source`. `vm`/`origin` decide where any
/// freshly-allocated string/array backing lands (`vm_alloc_mode`).
pub fn read_token(
    source: &mut dyn ByteSource,
    vm: &mut Vm,
    origin: VmOrigin,
    lookup: &mut dyn NameLookup,
) -> Result<TokenOutcome, Error> {
    text::read_token(source, vm, origin, lookup)
}

fn syntax_error(source: &mut dyn ByteSource, op: &'static str) -> Error {
    source.close();
    Error::new(ErrorKind::SyntaxError, op)
}
