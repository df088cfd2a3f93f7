//! The crate-wide error type.
//!
//! Every fallible operation in `front`/`middle`/`back` returns
//! `Result<T, CompileError>` and propagates with `?`; only the CLI binary
//! turns an `Err` into a diagnostic on stderr and a non-zero exit code.

use derive_more::{Display, Error};

use crate::common::Id;

#[derive(Debug, Display, Error)]
pub enum CompileError {
    /// Wrong argument count or an unrecognized mode on the command line.
    #[display("usage error: {_0}")]
    Usage(String),

    /// The lexer found a character that starts no valid token.
    #[display("unexpected character {_1:?} at byte offset {_0}")]
    UnexpectedChar(usize, char),

    /// The parser expected one thing and found another.
    #[display("parse error: expected {expected}, found {found:?}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    /// A name was used before being declared in any visible scope.
    #[display("undefined symbol: {name}")]
    UndefinedSymbol { name: Id },

    /// A name was declared twice in the same scope.
    #[display("redeclared symbol: {name}")]
    RedeclaredSymbol { name: Id },

    /// A `const` initializer did not fold to a compile-time integer.
    #[display("not a constant expression: {name}")]
    NotAConstant { name: Id },

    /// Division or modulo where the (fully literal) divisor is zero.
    #[display("division or modulo by zero in a constant expression")]
    DivisionByZero,

    /// The register pool was exhausted.
    #[display("register starvation: no free register available")]
    RegisterStarvation,

    /// The IR reader encountered text it could not parse as any known shape.
    #[display("malformed IR: {_0}")]
    IrMalformed(String),
}
