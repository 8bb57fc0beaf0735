//! vosh — an embeddable in-process UNIX-like runtime
//!
//! A virtual filesystem with content-addressed chunked storage, a
//! POSIX-subset shell (lexer → parser → expander → interpreter), and a
//! cooperative process/job model. Everything runs inside the host
//! process; no real kernel is ever touched.

pub mod ast;
pub mod commands;
pub mod content;
pub mod exec;
pub mod interpreter;
pub mod kernel;
pub mod parser;
pub mod shell;
pub mod terminal;
pub mod vfs;

pub use ast::types::*;
pub use content::{ChunkRef, ContentStore, CHUNK_SIZE, CHUNK_THRESHOLD};
pub use exec::{Command, CommandContext, CommandError, CommandRegistry, JobTable};
pub use interpreter::{Interpreter, ShellState};
pub use kernel::{Kernel, KernelOptions};
pub use parser::{parse, ParseError};
pub use shell::Shell;
pub use terminal::Terminal;
pub use vfs::{MountProvider, Vfs, VfsError, WatchEvent};
