//! Redirections
//!
//! Applies `> >> < 2> 2>> &>` and here-docs around a command. Output
//! redirections capture into buffers and flush to the VFS after the
//! command completes; `>` truncates its target up front, so a failing
//! open is detected (and the file truncated) before the command runs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::ast::types::{RedirOp, RedirTarget, Redirection};
use crate::exec::context::{BufferedWriter, StringInput};
use crate::interpreter::expansion::Expander;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::state::{ExecIo, ShellState};
use crate::vfs::path;

/// I/O rewired per the redirection list, plus the sinks to flush after
/// the command runs.
pub struct RedirPlan {
    pub io: ExecIo,
    sinks: Vec<Sink>,
}

impl std::fmt::Debug for RedirPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirPlan")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

struct Sink {
    path: String,
    append: bool,
    buffer: BufferedWriter,
}

impl Interpreter {
    /// Expand targets and rewire I/O. An unopenable target fails the
    /// whole plan; the caller reports it and skips the command.
    pub(crate) async fn plan_redirections(
        &self,
        state: &mut ShellState,
        redirections: &[Redirection],
        io: &ExecIo,
        stdin: Option<Box<dyn crate::exec::context::InputStream>>,
        cancel: &CancellationToken,
    ) -> Result<RedirPlan, String> {
        let mut plan = RedirPlan {
            io: ExecIo {
                stdout: io.stdout.clone(),
                stderr: io.stderr.clone(),
                stdin,
            },
            sinks: Vec::new(),
        };

        for redirection in redirections {
            match (&redirection.operator, &redirection.target) {
                (RedirOp::In, RedirTarget::HereDoc { body, .. }) => {
                    plan.io.stdin = Some(Box::new(StringInput::new(body.clone())));
                }
                (RedirOp::In, RedirTarget::Word(word)) => {
                    let abs = self.expand_target(state, word, io, cancel).await?;
                    let content = self
                        .vfs()
                        .read_file_string(&abs)
                        .await
                        .map_err(|e| e.to_string())?;
                    plan.io.stdin = Some(Box::new(StringInput::new(content)));
                }
                (op, RedirTarget::Word(word)) => {
                    let abs = self.expand_target(state, word, io, cancel).await?;
                    let append = matches!(op, RedirOp::Append | RedirOp::ErrAppend);

                    // Validate the target now; `>` also truncates now.
                    let result = if append {
                        self.vfs().append_file(&abs, b"").await
                    } else {
                        self.vfs().write_file(&abs, b"").await
                    };
                    result.map_err(|e| e.to_string())?;

                    let buffer = BufferedWriter::new();
                    let writer: Arc<dyn crate::exec::context::OutputStream> =
                        Arc::new(buffer.clone());
                    match op {
                        RedirOp::Out | RedirOp::Append => plan.io.stdout = writer,
                        RedirOp::Err | RedirOp::ErrAppend => plan.io.stderr = writer,
                        RedirOp::All => {
                            plan.io.stdout = writer.clone();
                            plan.io.stderr = writer;
                        }
                        RedirOp::In => unreachable!(),
                    }
                    plan.sinks.push(Sink {
                        path: abs,
                        append,
                        buffer,
                    });
                }
                (op, RedirTarget::HereDoc { .. }) => {
                    return Err(format!("cannot attach here-document to '{}'", op));
                }
            }
        }
        Ok(plan)
    }

    async fn expand_target(
        &self,
        state: &mut ShellState,
        word: &crate::ast::types::Word,
        io: &ExecIo,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        let mut expander = Expander::new(self, state, cancel, io.stderr.clone());
        let target = expander
            .expand_word_text(word)
            .await
            .map_err(|e| e.message.clone())?;
        if target.is_empty() {
            return Err("ambiguous redirect".to_string());
        }
        Ok(path::resolve(&state.cwd, &target))
    }
}

impl RedirPlan {
    /// Write captured output to the target files.
    pub async fn flush(&self, interp: &Interpreter) -> Result<(), String> {
        for sink in &self.sinks {
            let contents = sink.buffer.take();
            let result = if sink.append {
                interp.vfs().append_file(&sink.path, contents.as_bytes()).await
            } else {
                interp.vfs().write_file(&sink.path, contents.as_bytes()).await
            };
            result.map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Word;
    use crate::exec::context::{InputStream, OutputStream};

    fn out_redir(target: &str, op: RedirOp) -> Redirection {
        Redirection {
            operator: op,
            target: RedirTarget::Word(Word::literal(target)),
            fd_hint: None,
        }
    }

    #[tokio::test]
    async fn test_stdout_capture_and_flush() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        interp.vfs().mkdir("/tmp", true).await.unwrap();
        let io = ExecIo::new(
            Arc::new(BufferedWriter::new()),
            Arc::new(BufferedWriter::new()),
        );
        let cancel = CancellationToken::new();

        let plan = interp
            .plan_redirections(
                &mut state,
                &[out_redir("/tmp/out.txt", RedirOp::Out)],
                &io,
                None,
                &cancel,
            )
            .await
            .unwrap();
        plan.io.stdout.write("captured\n");
        plan.flush(&interp).await.unwrap();

        assert_eq!(
            interp.vfs().read_file_string("/tmp/out.txt").await.unwrap(),
            "captured\n"
        );
    }

    #[tokio::test]
    async fn test_append_accumulates() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        interp.vfs().write_file("/log", b"first\n").await.unwrap();
        let io = ExecIo::new(
            Arc::new(BufferedWriter::new()),
            Arc::new(BufferedWriter::new()),
        );
        let cancel = CancellationToken::new();

        let plan = interp
            .plan_redirections(
                &mut state,
                &[out_redir("/log", RedirOp::Append)],
                &io,
                None,
                &cancel,
            )
            .await
            .unwrap();
        plan.io.stdout.write("second\n");
        plan.flush(&interp).await.unwrap();

        assert_eq!(
            interp.vfs().read_file_string("/log").await.unwrap(),
            "first\nsecond\n"
        );
    }

    #[tokio::test]
    async fn test_truncate_happens_up_front() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        interp.vfs().write_file("/f", b"old contents").await.unwrap();
        let io = ExecIo::new(
            Arc::new(BufferedWriter::new()),
            Arc::new(BufferedWriter::new()),
        );
        let cancel = CancellationToken::new();

        let _plan = interp
            .plan_redirections(&mut state, &[out_redir("/f", RedirOp::Out)], &io, None, &cancel)
            .await
            .unwrap();
        // Before any flush the target is already truncated.
        assert_eq!(interp.vfs().read_file_string("/f").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_open_failure_reported() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        let io = ExecIo::new(
            Arc::new(BufferedWriter::new()),
            Arc::new(BufferedWriter::new()),
        );
        let cancel = CancellationToken::new();

        let err = interp
            .plan_redirections(
                &mut state,
                &[out_redir("/missing/dir/f", RedirOp::Out)],
                &io,
                None,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(err.contains("ENOENT"));
    }

    #[tokio::test]
    async fn test_stdin_from_file() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        interp.vfs().write_file("/input", b"file data").await.unwrap();
        let io = ExecIo::new(
            Arc::new(BufferedWriter::new()),
            Arc::new(BufferedWriter::new()),
        );
        let cancel = CancellationToken::new();

        let mut plan = interp
            .plan_redirections(
                &mut state,
                &[Redirection {
                    operator: RedirOp::In,
                    target: RedirTarget::Word(Word::literal("/input")),
                    fd_hint: None,
                }],
                &io,
                None,
                &cancel,
            )
            .await
            .unwrap();
        let data = plan.io.stdin.as_mut().unwrap().read_all().await;
        assert_eq!(data, "file data");
    }

    #[tokio::test]
    async fn test_heredoc_stdin() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        let io = ExecIo::new(
            Arc::new(BufferedWriter::new()),
            Arc::new(BufferedWriter::new()),
        );
        let cancel = CancellationToken::new();

        let mut plan = interp
            .plan_redirections(
                &mut state,
                &[Redirection {
                    operator: RedirOp::In,
                    target: RedirTarget::HereDoc {
                        body: "doc body\n".to_string(),
                        strip_tabs: false,
                    },
                    fd_hint: Some(0),
                }],
                &io,
                None,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(plan.io.stdin.as_mut().unwrap().read_all().await, "doc body\n");
    }
}
