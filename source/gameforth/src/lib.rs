//! # gameforth
//!
//! A small forth-inspired runtime. Source text is tokenized, compiled into
//! threaded code inside a fixed-size byte [`Memory`](memory::Memory), and
//! executed by an inner interpreter against bounded data and return stacks.
//!
//! Hosts extend the language with fixed-arity native words, see
//! [`Forth::create_builtin_word`].

pub mod dictionary;
pub mod fastr;
pub mod input;
pub mod memory;
pub mod output;
pub mod params;
pub mod stack;
#[cfg(any(test, feature = "_force_test_utils"))]
pub mod testutil;
pub mod vm;

use core::fmt;

pub use crate::input::Location;
pub use crate::params::ForthParams;
pub use crate::vm::{Forth, NativeArgs};
use crate::{memory::MemoryError, output::OutputError, stack::StackError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    Compile,
}

#[derive(Debug, PartialEq)]
pub enum Error {
    Stack(StackError),
    Memory(MemoryError),
    Output(OutputError),
    UndefinedWord { name: String, location: Location },
    MissingEntryPoint(String),
    MissingName { word: String, location: Location },
    ColonCompileMissingSemicolon { name: String },
    InterpretingCompileOnlyWord { name: String, location: Location },
    DefinitionInsideDefinition { name: String, location: Location },
    UnmatchedControl { name: String, location: Location },
    UnterminatedControl { name: &'static str, location: Location },
    MissingStringTerminator { location: Location },
    InvalidWordName(String),
    BadExecutionToken(i32),
    MissingOperand,
    LoopCountIsNegative,
    DivideByZero,
    StepBudgetExceeded { limit: u64 },
}

impl From<StackError> for Error {
    fn from(se: StackError) -> Self {
        Error::Stack(se)
    }
}

impl From<MemoryError> for Error {
    fn from(me: MemoryError) -> Self {
        Error::Memory(me)
    }
}

impl From<OutputError> for Error {
    fn from(oe: OutputError) -> Self {
        Error::Output(oe)
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::Output(OutputError::FormattingErr)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stack(e) => e.fmt(f),
            Error::Memory(e) => e.fmt(f),
            Error::Output(e) => e.fmt(f),
            Error::UndefinedWord { name, location } => {
                write!(f, "{location}: undefined word `{name}`")
            }
            Error::MissingEntryPoint(name) => write!(f, "{name} not defined"),
            Error::MissingName { word, location } => {
                write!(f, "{location}: `{word}` must be followed by a name")
            }
            Error::ColonCompileMissingSemicolon { name } => {
                write!(f, "definition of `{name}` is missing its closing `;`")
            }
            Error::InterpretingCompileOnlyWord { name, location } => {
                write!(f, "{location}: `{name}` may only be used inside a definition")
            }
            Error::DefinitionInsideDefinition { name, location } => {
                write!(f, "{location}: `{name}` may not be used inside a definition")
            }
            Error::UnmatchedControl { name, location } => {
                write!(f, "{location}: unmatched `{name}`")
            }
            Error::UnterminatedControl { name, location } => {
                write!(f, "{location}: `{name}` is never closed")
            }
            Error::MissingStringTerminator { location } => {
                write!(f, "{location}: string literal is missing its closing `\"`")
            }
            Error::InvalidWordName(name) => write!(f, "invalid word name {name:?}"),
            Error::BadExecutionToken(xt) => write!(f, "bad execution token {xt}"),
            Error::MissingOperand => f.write_str("instruction is missing its inline operand"),
            Error::LoopCountIsNegative => f.write_str("loop count is negative"),
            Error::DivideByZero => f.write_str("division by zero"),
            Error::StepBudgetExceeded { limit } => {
                write!(f, "execution exceeded the step budget of {limit} instructions")
            }
        }
    }
}

impl std::error::Error for Error {}

/// `WordFunc` represents a function that can be used as a builtin word.
///
/// Builtins have full access to the VM, unlike native words, which only see
/// their arguments, the host context and the program output.
pub type WordFunc<T> = fn(&mut Forth<T>) -> Result<(), Error>;

/// The result of resolving a single token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Word { xt: usize },
    Literal { val: i32 },
    Colon,
    Semicolon,
    LParen,
    Backslash,
    DotQuote,
    SQuote,
    If,
    Else,
    Then,
    Begin,
    Until,
    Again,
    While,
    Repeat,
    Do,
    Loop,
    PlusLoop,
    Recurse,
    Exit,
    Constant,
    Variable,
    Create,
}

trait ReplaceErr {
    type OK;
    fn replace_err<NE>(self, t: NE) -> Result<Self::OK, NE>;
}

impl<T, OE> ReplaceErr for Result<T, OE> {
    type OK = T;
    #[inline]
    fn replace_err<NE>(self, e: NE) -> Result<Self::OK, NE> {
        match self {
            Ok(t) => Ok(t),
            Err(_e) => Err(e),
        }
    }
}
