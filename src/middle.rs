//! The middle-end: the IR data model, its textual rendering, and a reader
//! that parses that text back into the same data model.

pub mod reader;
pub mod text;
pub mod tir;

pub use tir::*;
