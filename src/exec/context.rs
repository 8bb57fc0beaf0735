//! Command Context and Streams
//!
//! The narrow I/O interfaces commands are written against, and the
//! context struct the interpreter hands to every invocation. Output is a
//! plain `write` sink; input is an async chunk reader. A `BufferedWriter`
//! captures into memory (tests, command substitution), a `TerminalWriter`
//! forwards to the live terminal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::exec::pipe::{PipeReader, PipeWriter};
use crate::exec::registry::CommandRegistry;
use crate::exec::term_stdin::TerminalStdin;
use crate::terminal::Terminal;
use crate::vfs::{Vfs, VfsError};

/// Error escaping a command handler. The interpreter prints the message
/// to stderr and converts it to exit code 1.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct CommandError(pub String);

impl From<VfsError> for CommandError {
    fn from(err: VfsError) -> Self {
        CommandError(err.to_string())
    }
}

/// Write sink for command stdout/stderr.
pub trait OutputStream: Send + Sync {
    fn write(&self, text: &str);
}

/// Chunked async input for command stdin.
#[async_trait]
pub trait InputStream: Send + Sync {
    /// Next chunk, or `None` at EOF.
    async fn read(&mut self) -> Option<String>;

    /// Accumulate until EOF.
    async fn read_all(&mut self) -> String {
        let mut out = String::new();
        while let Some(chunk) = self.read().await {
            out.push_str(&chunk);
        }
        out
    }
}

/// Captures writes into an in-memory buffer.
#[derive(Clone, Default)]
pub struct BufferedWriter {
    buf: Arc<Mutex<String>>,
}

impl BufferedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buf.lock().unwrap().clone()
    }

    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf.lock().unwrap())
    }
}

impl OutputStream for BufferedWriter {
    fn write(&self, text: &str) {
        self.buf.lock().unwrap().push_str(text);
    }
}

/// Forwards writes to the attached terminal, translating bare `\n` to
/// `\r\n` for raw-mode displays.
pub struct TerminalWriter {
    term: Arc<dyn Terminal>,
}

impl TerminalWriter {
    pub fn new(term: Arc<dyn Terminal>) -> Self {
        Self { term }
    }
}

impl OutputStream for TerminalWriter {
    fn write(&self, text: &str) {
        self.term.write(&text.replace('\n', "\r\n"));
    }
}

/// One-shot input stream over a fixed string (`<` redirections,
/// here-docs).
pub struct StringInput {
    data: Option<String>,
}

impl StringInput {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

#[async_trait]
impl InputStream for StringInput {
    async fn read(&mut self) -> Option<String> {
        self.data.take()
    }
}

impl OutputStream for PipeWriter {
    fn write(&self, text: &str) {
        PipeWriter::write(self, text)
    }
}

#[async_trait]
impl InputStream for PipeReader {
    async fn read(&mut self) -> Option<String> {
        PipeReader::read(self).await
    }
}

/// Adapter reading from the shared terminal stdin, honouring the owning
/// job's cancellation token.
pub struct TerminalInput {
    stdin: Arc<TerminalStdin>,
    cancel: CancellationToken,
}

impl TerminalInput {
    pub fn new(stdin: Arc<TerminalStdin>, cancel: CancellationToken) -> Self {
        Self { stdin, cancel }
    }
}

#[async_trait]
impl InputStream for TerminalInput {
    async fn read(&mut self) -> Option<String> {
        tokio::select! {
            chunk = self.stdin.read() => chunk,
            _ = self.cancel.cancelled() => None,
        }
    }
}

/// Everything a command handler receives.
pub struct CommandContext {
    /// argv[1..]; argv[0] is the command name
    pub args: Vec<String>,
    /// Environment snapshot at invocation time
    pub env: HashMap<String, String>,
    /// Absolute working directory
    pub cwd: String,
    pub vfs: Arc<Vfs>,
    pub stdout: Arc<dyn OutputStream>,
    pub stderr: Arc<dyn OutputStream>,
    pub stdin: Option<Box<dyn InputStream>>,
    /// Trips when the job is cancelled; handlers poll it and return 130
    pub signal: CancellationToken,
    /// Present only when the kernel wires the capability
    pub set_raw_mode: Option<Arc<dyn Fn(bool) + Send + Sync>>,
    pub registry: Option<Arc<CommandRegistry>>,
}

impl CommandContext {
    /// Resolve a possibly-relative path argument against the cwd.
    pub fn resolve_path(&self, p: &str) -> String {
        crate::vfs::path::resolve(&self.cwd, p)
    }

    /// Drain stdin if the command has one.
    pub async fn read_stdin(&mut self) -> String {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.read_all().await,
            None => String::new(),
        }
    }
}

/// A registered command. Implementations consume the context only; extra
/// capabilities arrive as handles stored by their constructors.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_writer() {
        let writer = BufferedWriter::new();
        writer.write("a");
        writer.write("b");
        assert_eq!(writer.contents(), "ab");
        assert_eq!(writer.take(), "ab");
        assert_eq!(writer.contents(), "");
    }

    #[tokio::test]
    async fn test_string_input_is_one_shot() {
        let mut input = StringInput::new("payload");
        assert_eq!(input.read().await.as_deref(), Some("payload"));
        assert_eq!(input.read().await, None);
    }

    #[tokio::test]
    async fn test_terminal_input_cancellation() {
        let stdin = Arc::new(TerminalStdin::new());
        let token = CancellationToken::new();
        let mut input = TerminalInput::new(stdin, token.clone());
        let reader = tokio::spawn(async move { input.read().await });
        tokio::task::yield_now().await;
        token.cancel();
        assert_eq!(reader.await.unwrap(), None);
    }
}
