//! The 27-member PostScript error taxonomy and `errordict` dispatch.
//!
//! Grounded on `core/error.py`: raising an error pauses execution-history
//! recording, looks up `errordict` *dynamically* (a program may replace it),
//! pushes the bound handler onto the execution stack, and pushes the
//! offending operator's name onto the operand stack.

use num_enum::TryFromPrimitive;
use std::fmt;

/// One entry per PostScript error name. Numbering matches
/// `core/error.py` exactly so the wire-visible error names line up with
/// what PostScript programs expect from `$error /errorname get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ErrorKind {
    VmError = 0,
    DictFull = 1,
    DictStackOverflow = 2,
    DictStackUnderflow = 3,
    ExecStackOverflow = 4,
    InvalidAccess = 5,
    InvalidExit = 6,
    InvalidFileAccess = 7,
    InvalidFont = 8,
    InvalidRestore = 9,
    IoError = 10,
    LimitCheck = 11,
    NoCurrentPoint = 12,
    RangeCheck = 13,
    StackOverflow = 14,
    StackUnderflow = 15,
    SyntaxError = 16,
    Timeout = 17,
    TypeCheck = 18,
    Undefined = 19,
    UndefinedFilename = 20,
    UndefinedResource = 21,
    UndefinedResult = 22,
    UnmatchedMark = 23,
    Unregistered = 24,
    Unsupported = 25,
    ConfigurationError = 26,
}

impl ErrorKind {
    /// The `errordict` key for this error, e.g. `b"undefined"`.
    #[must_use]
    pub fn name(self) -> &'static [u8] {
        match self {
            Self::VmError => b"VMerror",
            Self::DictFull => b"dictfull",
            Self::DictStackOverflow => b"dictstackoverflow",
            Self::DictStackUnderflow => b"dictstackunderflow",
            Self::ExecStackOverflow => b"execstackoverflow",
            Self::InvalidAccess => b"invalidaccess",
            Self::InvalidExit => b"invalidexit",
            Self::InvalidFileAccess => b"invalidfileaccess",
            Self::InvalidFont => b"invalidfont",
            Self::InvalidRestore => b"invalidrestore",
            Self::IoError => b"ioerror",
            Self::LimitCheck => b"limitcheck",
            Self::NoCurrentPoint => b"nocurrentpoint",
            Self::RangeCheck => b"rangecheck",
            Self::StackOverflow => b"stackoverflow",
            Self::StackUnderflow => b"stackunderflow",
            Self::SyntaxError => b"syntaxerror",
            Self::Timeout => b"timeout",
            Self::TypeCheck => b"typecheck",
            Self::Undefined => b"undefined",
            Self::UndefinedFilename => b"undefinedfilename",
            Self::UndefinedResource => b"undefinedresource",
            Self::UndefinedResult => b"undefinedresult",
            Self::UnmatchedMark => b"unmatchedmark",
            Self::Unregistered => b"unregistered",
            Self::Unsupported => b"unsupported",
            Self::ConfigurationError => b"configurationerror",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(std::str::from_utf8(self.name()).unwrap_or("error"))
    }
}

/// A raised PostScript error: its kind and the operator that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub operator: &'static str,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, operator: &'static str) -> Self {
        Self { kind, operator }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in --{}--", self.kind, self.operator)
    }
}

impl std::error::Error for Error {}

/// Dispatch contract implemented by anything that can receive an error:
/// pause history recording, look up `errordict` dynamically, and queue
/// the handler. The evaluator (`stack::Context`) implements this; kept as
/// a trait so operator functions can raise without taking a hard
/// dependency on the concrete evaluator type.
pub trait ErrorSink {
    fn raise(&mut self, err: Error);
}
