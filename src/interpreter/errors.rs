//! Interpreter Errors and Control Flow
//!
//! `Flow` is the value every AST evaluation yields: a plain exit code, or
//! a control-flow signal (`break`/`continue`/`return`/`exit`) travelling
//! up to the construct that handles it. Expansion failures are ordinary
//! errors converted to exit codes at the simple-command boundary.

use thiserror::Error;

/// Exit code for a command killed by cancellation (SIGINT).
pub const EXIT_INTERRUPT: i32 = 130;

/// Exit code for an unresolvable command name.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code for syntax errors.
pub const EXIT_SYNTAX: i32 = 2;

/// Result of evaluating an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Normal completion with an exit code
    Code(i32),
    /// `break [n]` — unwinds n enclosing loops
    Break(u32),
    /// `continue [n]` — restarts the nth enclosing loop
    Continue(u32),
    /// `return [code]` — unwinds to the nearest function call
    Return(i32),
    /// `exit [code]` — unwinds the whole script
    Exit(i32),
}

impl Flow {
    pub const OK: Flow = Flow::Code(0);

    /// The exit code this flow resolves to where it stops propagating.
    pub fn code(self) -> i32 {
        match self {
            Flow::Code(code) | Flow::Return(code) | Flow::Exit(code) => code,
            Flow::Break(_) | Flow::Continue(_) => 0,
        }
    }

    /// True for break/continue/return/exit.
    pub fn is_control(self) -> bool {
        !matches!(self, Flow::Code(_))
    }
}

/// Failure during word expansion (bad substitution, arithmetic error,
/// `${VAR:?msg}`). The enclosing simple command does not run; exit 1.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ExpandError {
    pub message: String,
}

impl ExpandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
