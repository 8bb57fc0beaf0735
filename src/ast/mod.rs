//! Abstract Syntax Tree
//!
//! Node types produced by the parser and consumed by the interpreter.
//!
//! Architecture:
//!   Input → Lexer → Parser → AST → Expander → Interpreter → Output

pub mod types;

pub use types::*;
