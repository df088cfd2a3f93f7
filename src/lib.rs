//! A compiler for a small C-like language (a SysY subset) targeting RISC-V
//! 32-bit assembly, structured as a library. See `src/bin` for the CLI.

pub mod back;
pub mod common;
pub mod error;
pub mod front;
pub mod middle;

pub use error::CompileError;
