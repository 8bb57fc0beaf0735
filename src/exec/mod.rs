//! Execution Substrate
//!
//! Everything a running command needs that is not the filesystem: the
//! command registry, inter-stage pipe channels, the job/process table,
//! terminal-backed stdin, and the context handed to command handlers.

pub mod context;
pub mod jobs;
pub mod pipe;
pub mod registry;
pub mod term_stdin;

pub use context::{
    BufferedWriter, Command, CommandContext, CommandError, InputStream, OutputStream, StringInput,
    TerminalInput, TerminalWriter,
};
pub use jobs::{JobInfo, JobState, JobTable};
pub use pipe::{pipe_channel, PipeReader, PipeWriter};
pub use registry::CommandRegistry;
pub use term_stdin::TerminalStdin;
