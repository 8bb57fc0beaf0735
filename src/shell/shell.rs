//! Shell Facade
//!
//! Owns the prompt, the raw-key line editor, history, and completion,
//! and hands submitted lines to the interpreter. While a foreground
//! command runs, keystrokes are routed to its stdin; Ctrl+C trips its
//! cancellation token, Ctrl+Z detaches it into the job table, and
//! Ctrl+D closes its stdin.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::exec::context::{OutputStream, TerminalInput, TerminalWriter};
use crate::exec::term_stdin::TerminalStdin;
use crate::interpreter::builtins::{Builtin, BuiltinCtx};
use crate::interpreter::errors::Flow;
use crate::interpreter::state::{ExecIo, ShellState};
use crate::interpreter::Interpreter;
use crate::shell::history::History;
use crate::terminal::{NullTerminal, Terminal};

const DEFAULT_PS1: &str = "\\u@\\h:\\w\\$ ";

pub struct ShellOptions {
    /// Source /etc/profile and ~/.bashrc before the first prompt
    pub source_startup_files: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            source_startup_files: true,
        }
    }
}

/// The running foreground command. It executes on a clone of the shell
/// state; the clone is merged back when the command finishes in the
/// foreground, and kept private to the job if it gets detached.
struct ForegroundJob {
    handle: JoinHandle<(i32, ShellState)>,
    token: CancellationToken,
    stdin: Arc<TerminalStdin>,
    cmdline: String,
}

pub struct Shell {
    interp: Interpreter,
    state: Arc<tokio::sync::Mutex<ShellState>>,
    term: Arc<dyn Terminal>,
    history: Arc<StdMutex<History>>,
    options: ShellOptions,
    line: String,
    cursor: usize,
    /// Partial escape sequence carried across key chunks
    pending_escape: String,
    running: bool,
    foreground: Option<ForegroundJob>,
}

impl Shell {
    pub fn new(
        interp: Interpreter,
        mut state: ShellState,
        term: Arc<dyn Terminal>,
        options: ShellOptions,
    ) -> Self {
        let history = Arc::new(StdMutex::new(History::new()));
        state.builtins.insert(
            "history".to_string(),
            Arc::new(HistoryBuiltin {
                history: history.clone(),
            }),
        );
        Self {
            interp,
            state: Arc::new(tokio::sync::Mutex::new(state)),
            term,
            history,
            options,
            line: String::new(),
            cursor: 0,
            pending_escape: String::new(),
            running: true,
            foreground: None,
        }
    }

    /// Shared state handle, for hosts that inspect or seed the shell.
    pub fn state(&self) -> Arc<tokio::sync::Mutex<ShellState>> {
        self.state.clone()
    }

    /// Main loop: consume raw key chunks until the channel closes or an
    /// `exit` terminates the shell. A shell whose key source went away
    /// can be re-attached by calling `run` with a fresh channel.
    pub async fn run(&mut self, mut keys: mpsc::UnboundedReceiver<String>) {
        self.running = true;
        if self.options.source_startup_files {
            self.source_startup_files().await;
        }
        self.show_motd().await;
        self.show_prompt().await;

        while self.running {
            if let Some(foreground) = self.foreground.take() {
                self.run_foreground(foreground, &mut keys).await;
                if !self.running {
                    break;
                }
                self.show_prompt().await;
                continue;
            }
            match keys.recv().await {
                Some(data) => self.handle_keys(&data).await,
                None => break,
            }
        }
    }

    // ------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------

    async fn source_startup_files(&mut self) {
        let null_term: Arc<dyn Terminal> = Arc::new(NullTerminal);
        let mut io = ExecIo::new(
            Arc::new(TerminalWriter::new(null_term.clone())),
            Arc::new(TerminalWriter::new(null_term)),
        );
        let cancel = CancellationToken::new();
        let mut state = self.state.lock().await;

        let mut files = vec!["/etc/profile".to_string()];
        if let Some(home) = state.get_env("HOME") {
            files.push(format!("{}/.bashrc", home));
        }
        for file in files {
            if let Ok(content) = self.interp.vfs().read_file_string(&file).await {
                let _ = self
                    .interp
                    .exec_source(&mut state, &content, &mut io, &cancel)
                    .await;
            }
        }
    }

    async fn show_motd(&self) {
        if let Ok(motd) = self.interp.vfs().read_file_string("/etc/motd").await {
            if !motd.trim().is_empty() {
                self.term.write(&motd.replace('\n', "\r\n"));
            }
        }
    }

    // ------------------------------------------------------------------
    // Foreground command handling
    // ------------------------------------------------------------------

    async fn run_foreground(
        &mut self,
        mut foreground: ForegroundJob,
        keys: &mut mpsc::UnboundedReceiver<String>,
    ) {
        loop {
            tokio::select! {
                result = &mut foreground.handle => {
                    if let Ok((_code, new_state)) = result {
                        *self.state.lock().await = new_state;
                    }
                    return;
                }
                maybe_key = keys.recv() => match maybe_key {
                    Some(data) => {
                        if data.contains('\x03') {
                            // Ctrl+C: interrupt the foreground job.
                            foreground.token.cancel();
                        } else if data.contains('\x1a') {
                            // Ctrl+Z: detach into the job table.
                            self.detach(foreground).await;
                            return;
                        } else if data.contains('\x04') {
                            foreground.stdin.close();
                        } else {
                            foreground.stdin.feed(&data);
                        }
                    }
                    None => {
                        // Host went away: finish the command off EOF.
                        foreground.stdin.close();
                        if let Ok((_code, new_state)) = (&mut foreground.handle).await {
                            *self.state.lock().await = new_state;
                        }
                        self.running = false;
                        return;
                    }
                }
            }
        }
    }

    /// Move the foreground command into the job table. Its state clone
    /// stays private: a detached job no longer mutates the shell.
    async fn detach(&mut self, foreground: ForegroundJob) {
        let stdin = foreground.stdin.clone();
        let handle = foreground.handle;
        let reaper = tokio::spawn(async move {
            handle.await.map(|(code, _state)| code).unwrap_or(1)
        });
        let id = self.interp.jobs().add(
            foreground.cmdline,
            foreground.token,
            reaper,
            Some(Box::new(move || stdin.close())),
        );
        self.state.lock().await.last_background_pid = Some(id + 1);
        self.term
            .write(&format!("\r\n[{}]+ continued in background\r\n", id));
    }

    // ------------------------------------------------------------------
    // Line editing
    // ------------------------------------------------------------------

    async fn handle_keys(&mut self, data: &str) {
        let input = format!("{}{}", std::mem::take(&mut self.pending_escape), data);
        let chars: Vec<char> = input.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\r' | '\n' => {
                    i += 1;
                    self.term.write("\r\n");
                    let line = std::mem::take(&mut self.line);
                    self.cursor = 0;
                    self.submit(line).await;
                    if self.running && self.foreground.is_none() {
                        self.show_prompt().await;
                    }
                    if self.foreground.is_some() {
                        // Remaining chars belong to the new command's stdin.
                        let rest: String = chars[i..].iter().collect();
                        if !rest.is_empty() {
                            if let Some(fg) = &self.foreground {
                                fg.stdin.feed(&rest);
                            }
                        }
                        return;
                    }
                }
                '\x7f' | '\x08' => {
                    i += 1;
                    if self.cursor > 0 {
                        self.cursor -= 1;
                        let byte_index = char_to_byte_index(&self.line, self.cursor);
                        self.line.remove(byte_index);
                        self.redraw().await;
                    }
                }
                '\x03' => {
                    i += 1;
                    self.term.write("^C\r\n");
                    self.line.clear();
                    self.cursor = 0;
                    self.history.lock().unwrap().reset_cursor();
                    self.show_prompt().await;
                }
                '\x04' => {
                    i += 1;
                    if self.line.is_empty() {
                        self.term.write("exit\r\n");
                        self.running = false;
                        return;
                    }
                }
                '\t' => {
                    i += 1;
                    self.complete().await;
                }
                '\x1b' => {
                    let rest: String = chars[i..].iter().collect();
                    match parse_escape(&rest) {
                        EscapeKey::Incomplete => {
                            self.pending_escape = rest;
                            return;
                        }
                        EscapeKey::Up(len) => {
                            i += len;
                            let recalled = self.history.lock().unwrap().previous().map(str::to_string);
                            if let Some(entry) = recalled {
                                self.replace_line(entry).await;
                            }
                        }
                        EscapeKey::Down(len) => {
                            i += len;
                            let recalled = self.history.lock().unwrap().next().map(str::to_string);
                            self.replace_line(recalled.unwrap_or_default()).await;
                        }
                        EscapeKey::Right(len) => {
                            i += len;
                            if self.cursor < self.line.chars().count() {
                                self.cursor += 1;
                                self.term.write("\x1b[C");
                            }
                        }
                        EscapeKey::Left(len) => {
                            i += len;
                            if self.cursor > 0 {
                                self.cursor -= 1;
                                self.term.write("\x1b[D");
                            }
                        }
                        EscapeKey::Unknown(len) => i += len,
                    }
                }
                c if !c.is_control() => {
                    i += 1;
                    let byte_index = char_to_byte_index(&self.line, self.cursor);
                    self.line.insert(byte_index, c);
                    self.cursor += 1;
                    if self.cursor == self.line.chars().count() {
                        self.term.write(&c.to_string());
                    } else {
                        self.redraw().await;
                    }
                }
                _ => i += 1,
            }
        }
    }

    /// Run one submitted line as the foreground job.
    async fn submit(&mut self, line: String) {
        if line.trim().is_empty() {
            return;
        }

        let expanded = match self.history.lock().unwrap().expand(&line) {
            Ok(expanded) => expanded,
            Err(message) => {
                self.term.write(&format!("vosh: {}\r\n", message));
                return;
            }
        };
        if expanded != line {
            // Echo the expanded command, like interactive bash.
            self.term.write(&format!("{}\r\n", expanded));
        }
        self.history.lock().unwrap().push(&expanded);

        let interp = self.interp.clone();
        let state = self.state.clone();
        let token = CancellationToken::new();
        let stdin = Arc::new(TerminalStdin::new());
        let writer: Arc<dyn OutputStream> = Arc::new(TerminalWriter::new(self.term.clone()));
        let mut io = ExecIo::new(writer.clone(), writer);
        io.stdin = Some(Box::new(TerminalInput::new(stdin.clone(), token.clone())));

        let task_token = token.clone();
        let source = expanded.clone();
        let handle = tokio::spawn(async move {
            // Snapshot the state so the shell stays responsive (and a
            // detached job cannot mutate it); merged back on completion.
            let mut task_state = state.lock().await.clone();
            let code = interp.run(&mut task_state, &source, &mut io, &task_token).await;
            (code, task_state)
        });

        self.foreground = Some(ForegroundJob {
            handle,
            token,
            stdin,
            cmdline: expanded,
        });
    }

    // ------------------------------------------------------------------
    // Prompt & display
    // ------------------------------------------------------------------

    async fn show_prompt(&self) {
        let state = self.state.lock().await;
        let ps1 = state
            .get_env("PS1")
            .unwrap_or(DEFAULT_PS1)
            .to_string();
        self.term.write(&expand_prompt(&ps1, &state));
    }

    async fn redraw(&self) {
        let state = self.state.lock().await;
        let ps1 = state.get_env("PS1").unwrap_or(DEFAULT_PS1).to_string();
        let prompt = expand_prompt(&ps1, &state);
        drop(state);

        self.term.write(&format!("\r\x1b[K{}{}", prompt, self.line));
        let tail = self.line.chars().count() - self.cursor;
        if tail > 0 {
            self.term.write(&format!("\x1b[{}D", tail));
        }
    }

    async fn replace_line(&mut self, line: String) {
        self.line = line;
        self.cursor = self.line.chars().count();
        self.redraw().await;
    }

    /// Best-effort TAB completion: command names for the first word,
    /// cwd entries afterwards.
    async fn complete(&mut self) {
        let before_cursor: String = self.line.chars().take(self.cursor).collect();
        let word_start = before_cursor
            .rfind(char::is_whitespace)
            .map(|p| p + 1)
            .unwrap_or(0);
        let prefix = &before_cursor[word_start..];
        if prefix.is_empty() {
            return;
        }

        let state = self.state.lock().await;
        let mut candidates: Vec<String> = if word_start == 0 {
            let mut names: Vec<String> = state.builtins.keys().cloned().collect();
            names.extend(state.functions.keys().cloned());
            names.extend(state.aliases.keys().cloned());
            names.extend(self.interp.registry().list());
            names
        } else {
            match self.interp.vfs().readdir(&state.cwd).await {
                Ok(entries) => entries.into_iter().map(|e| e.name).collect(),
                Err(_) => Vec::new(),
            }
        };
        drop(state);

        candidates.retain(|c| c.starts_with(prefix));
        candidates.sort();
        candidates.dedup();

        let Some(completion) = common_prefix(&candidates) else {
            return;
        };
        if completion.len() > prefix.len() {
            let insertion = &completion[prefix.len()..];
            let byte_index = char_to_byte_index(&self.line, self.cursor);
            self.line.insert_str(byte_index, insertion);
            self.cursor += insertion.chars().count();
            if candidates.len() == 1 {
                let byte_index = char_to_byte_index(&self.line, self.cursor);
                self.line.insert(byte_index, ' ');
                self.cursor += 1;
            }
            self.redraw().await;
        }
    }
}

// ----------------------------------------------------------------------
// History builtin (registered by the facade)
// ----------------------------------------------------------------------

struct HistoryBuiltin {
    history: Arc<StdMutex<History>>,
}

#[async_trait]
impl Builtin for HistoryBuiltin {
    fn name(&self) -> &'static str {
        "history"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, _args: &[String]) -> Flow {
        let entries: Vec<String> = self.history.lock().unwrap().entries().to_vec();
        for (i, entry) in entries.iter().enumerate() {
            ctx.io.stdout.write(&format!("{:>5}  {}\n", i + 1, entry));
        }
        Flow::OK
    }
}

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

enum EscapeKey {
    Up(usize),
    Down(usize),
    Right(usize),
    Left(usize),
    Unknown(usize),
    Incomplete,
}

fn parse_escape(input: &str) -> EscapeKey {
    let chars: Vec<char> = input.chars().collect();
    match chars.get(1) {
        None => EscapeKey::Incomplete,
        Some('[') => match chars.get(2) {
            None => EscapeKey::Incomplete,
            Some('A') => EscapeKey::Up(3),
            Some('B') => EscapeKey::Down(3),
            Some('C') => EscapeKey::Right(3),
            Some('D') => EscapeKey::Left(3),
            Some(_) => EscapeKey::Unknown(3),
        },
        Some(_) => EscapeKey::Unknown(2),
    }
}

fn char_to_byte_index(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn common_prefix(candidates: &[String]) -> Option<String> {
    let first = candidates.first()?;
    let mut prefix = first.clone();
    for candidate in &candidates[1..] {
        while !candidate.starts_with(&prefix) {
            prefix.pop();
            if prefix.is_empty() {
                return None;
            }
        }
    }
    Some(prefix)
}

/// Expand the PS1 escapes the facade supports: `\u \h \w \W \$ \n`.
fn expand_prompt(ps1: &str, state: &ShellState) -> String {
    let mut out = String::new();
    let mut chars = ps1.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('u') => out.push_str(state.get_env("USER").unwrap_or("user")),
            Some('h') => out.push_str(state.get_env("HOSTNAME").unwrap_or("localhost")),
            Some('w') => {
                let cwd = &state.cwd;
                match state.get_env("HOME") {
                    Some(home) if cwd == home => out.push('~'),
                    Some(home) if cwd.starts_with(&format!("{}/", home)) => {
                        out.push('~');
                        out.push_str(&cwd[home.len()..]);
                    }
                    _ => out.push_str(cwd),
                }
            }
            Some('W') => {
                let base = crate::vfs::path::basename(&state.cwd);
                out.push_str(if base.is_empty() { "/" } else { &base });
            }
            Some('$') => out.push('$'),
            Some('n') => out.push_str("\r\n"),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
