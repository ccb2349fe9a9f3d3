//! The tagged object representation ("Composite object", "Name" in the
//! GLOSSARY) and its attributes.
//!
//! Composites never carry their backing storage inline. An [`Object`]
//! holding a `String`/`Array`/`PackedArray`/`Dict` variant carries only a
//! [`CompositeRef`] — `(timestamp, origin)` — that indexes into the VM's
//! arena (see `vm.rs`). This is what lets `restore` revert storage in
//! place and have every alias (including names bound via `//`) observe
//! the revert, without reference-counting a potentially cyclic graph.

use std::fmt;

/// Literal objects are pushed onto the operand stack when encountered;
/// executable objects are executed directly (names are looked up first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Literal,
    Executable,
}

/// Access attributes only ever *lower* (PLRM "Access monotonicity").
/// Ordering here is significant: `Access::lower` is a saturating min.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    None = 0,
    ExecuteOnly = 1,
    ReadOnly = 2,
    Unlimited = 3,
}

impl Access {
    /// Attempt to set a new (necessarily lower-or-equal) access level.
    /// Returns `false` if `new` would raise access above the current level.
    #[must_use]
    pub fn try_lower(self, new: Access) -> Option<Access> {
        if new <= self { Some(new) } else { None }
    }
}

/// Which VM address space a composite's backing storage lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmOrigin {
    Local,
    Global,
}

/// A handle into the VM arena. `timestamp` is the monotonic creation
/// order used both as the arena key and as the quantity compared against
/// a save's `created` field for invalid-restore detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeRef {
    pub timestamp: u64,
    pub origin: VmOrigin,
}

/// A `(offset, start, length)` view used for substrings/subarrays
/// (`getinterval` and friends). `offset` addresses into the backing
/// store named by the enclosing [`CompositeRef`]; `start`/`length` are
/// exposed for bookkeeping but the canonical slice is always
/// `backing[offset .. offset + length]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub offset: usize,
    pub length: usize,
}

/// Interned name. Two names with the same bytes compare equal regardless
/// of literal/executable attribute — the attribute lives on the
/// enclosing [`Object`], not on the interned bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(pub std::sync::Arc<[u8]>);

impl Name {
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self(std::sync::Arc::from(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Integers and reals compare and arithmetic-combine freely (PLRM 3.14 /
/// `operators/math.py`). The result is an integer only when both operands
/// were integers and the value fits `i32`; otherwise it is promoted to
/// `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Real(f64),
}

impl Number {
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => f64::from(i),
            Number::Real(r) => r,
        }
    }

    /// Combine two numbers with a closure operating in `f64`, demoting
    /// back to `Int` when both inputs were integers and the exact result
    /// fits in `i32`.
    #[must_use]
    pub fn combine(self, other: Number, f: impl Fn(f64, f64) -> f64) -> Number {
        let both_int = matches!((self, other), (Number::Int(_), Number::Int(_)));
        let result = f(self.as_f64(), other.as_f64());
        if both_int && result.fract() == 0.0 && result >= i32::MIN as f64 && result <= i32::MAX as f64 {
            Number::Int(result as i32)
        } else {
            Number::Real(result)
        }
    }

    #[must_use]
    pub fn add(self, other: Number) -> Number {
        self.combine(other, |a, b| a + b)
    }

    #[must_use]
    pub fn sub(self, other: Number) -> Number {
        self.combine(other, |a, b| a - b)
    }

    #[must_use]
    pub fn mul(self, other: Number) -> Number {
        self.combine(other, |a, b| a * b)
    }

    #[must_use]
    pub fn neg(self) -> Number {
        match self {
            Number::Int(i) => i.checked_neg().map(Number::Int).unwrap_or(Number::Real(-f64::from(i))),
            Number::Real(r) => Number::Real(-r),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Real(r) => write!(f, "{r}"),
        }
    }
}

/// The value-model tag. One variant per PLRM object type named in the
/// data model.
#[derive(Debug, Clone)]
pub enum Object {
    Null,
    Int(i32),
    Real(f64),
    Bool(bool),
    Mark,
    Name(Name),
    /// String view: backing ref + interval into it.
    String(CompositeRef, View),
    Array(CompositeRef, View),
    PackedArray(CompositeRef, View),
    Dict(CompositeRef),
    Operator(OperatorId),
    File(FileId),
    Save(SaveId),
    GState(GStateId),
    FontId(u32),
}

/// Interned operator identity: resolved once by the dispatch table,
/// never re-looked-up by name at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GStateId(pub u32);

/// The unit that actually flows through the stacks: a tagged [`Object`]
/// plus its literal/executable and access attributes. Access defaults to
/// `Unlimited` and literal/executable defaults depend on how the object
/// was produced (the tokeniser sets it explicitly).
#[derive(Debug, Clone)]
pub struct Value {
    pub object: Object,
    pub attr: Attribute,
    pub access: Access,
}

impl Value {
    #[must_use]
    pub fn literal(object: Object) -> Self {
        Self { object, attr: Attribute::Literal, access: Access::Unlimited }
    }

    #[must_use]
    pub fn executable(object: Object) -> Self {
        Self { object, attr: Attribute::Executable, access: Access::Unlimited }
    }

    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.attr == Attribute::Executable
    }

    /// Lower this value's access attribute; returns `false` if `new`
    /// would raise it (PLRM access monotonicity).
    #[must_use]
    pub fn set_access(&mut self, new: Access) -> bool {
        match self.access.try_lower(new) {
            Some(a) => {
                self.access = a;
                true
            }
            None => false,
        }
    }
}

impl Object {
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Object::String(..) | Object::Array(..) | Object::PackedArray(..) | Object::Dict(..)
        )
    }

    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Object::Int(i) => Some(Number::Int(*i)),
            Object::Real(r) => Some(Number::Real(*r)),
            _ => None,
        }
    }

    /// The VM origin of a composite object, if any.
    #[must_use]
    pub fn vm_origin(&self) -> Option<VmOrigin> {
        match self {
            Object::String(r, _) | Object::Array(r, _) | Object::PackedArray(r, _) | Object::Dict(r) => {
                Some(r.origin)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn composite_ref(&self) -> Option<CompositeRef> {
        match self {
            Object::String(r, _) | Object::Array(r, _) | Object::PackedArray(r, _) | Object::Dict(r) => Some(*r),
            _ => None,
        }
    }

    /// Structural type name, as returned by the `type` operator.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "nulltype",
            Object::Int(_) => "integertype",
            Object::Real(_) => "realtype",
            Object::Bool(_) => "booleantype",
            Object::Mark => "marktype",
            Object::Name(_) => "nametype",
            Object::String(..) => "stringtype",
            Object::Array(..) => "arraytype",
            Object::PackedArray(..) => "packedarraytype",
            Object::Dict(_) => "dicttype",
            Object::Operator(_) => "operatortype",
            Object::File(_) => "filetype",
            Object::Save(_) => "savetype",
            Object::GState(_) => "gstatetype",
            Object::FontId(_) => "fonttype",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_add_stays_int() {
        let a = Number::Int(3);
        let b = Number::Int(4);
        assert_eq!(a.add(b), Number::Int(7));
    }

    #[test]
    fn int_overflow_promotes_to_real() {
        let a = Number::Int(i32::MAX);
        let b = Number::Int(1);
        match a.add(b) {
            Number::Real(r) => assert_eq!(r, f64::from(i32::MAX) + 1.0),
            Number::Int(_) => panic!("expected promotion to real on overflow"),
        }
    }

    #[test]
    fn access_can_only_lower() {
        assert_eq!(Access::Unlimited.try_lower(Access::ReadOnly), Some(Access::ReadOnly));
        assert_eq!(Access::ReadOnly.try_lower(Access::Unlimited), None);
        assert_eq!(Access::ReadOnly.try_lower(Access::ReadOnly), Some(Access::ReadOnly));
    }

    #[test]
    fn names_compare_by_bytes_only() {
        assert_eq!(Name::new(b"foo"), Name::new(b"foo"));
        assert_ne!(Name::new(b"foo"), Name::new(b"bar"));
    }
}
