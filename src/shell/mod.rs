//! Interactive Shell
//!
//! Prompt, raw-key line editing, history, completion, and the wiring
//! between the terminal and the interpreter.

pub mod history;
pub mod shell;

pub use history::History;
pub use shell::{Shell, ShellOptions};
