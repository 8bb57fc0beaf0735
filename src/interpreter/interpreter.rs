//! Interpreter
//!
//! Walks the AST in source order. Lists honour `&&`/`||` short-circuit
//! and `&` background registration; pipelines run their stages as
//! concurrent tasks joined by pipe channels; simple commands expand,
//! resolve (builtin, then function, then registry) and run against the
//! redirection-rewired I/O. Multi-stage pipelines and background lists
//! execute on cloned state, so their assignments stay local.

use std::sync::Arc;

use async_recursion::async_recursion;
use tokio_util::sync::CancellationToken;

use crate::ast::types::*;
use crate::exec::context::{CommandContext, OutputStream};
use crate::exec::jobs::JobTable;
use crate::exec::pipe::pipe_channel;
use crate::exec::registry::CommandRegistry;
use crate::interpreter::builtins::BuiltinCtx;
use crate::interpreter::errors::{ExpandError, Flow, EXIT_INTERRUPT, EXIT_NOT_FOUND, EXIT_SYNTAX};
use crate::interpreter::expansion::Expander;
use crate::interpreter::state::{ExecIo, ShellState};
use crate::parser::parse;
use crate::vfs::Vfs;

#[derive(Clone)]
pub struct Interpreter {
    vfs: Arc<Vfs>,
    registry: Arc<CommandRegistry>,
    jobs: Arc<JobTable>,
}

impl Interpreter {
    pub fn new(vfs: Arc<Vfs>, registry: Arc<CommandRegistry>, jobs: Arc<JobTable>) -> Self {
        Self {
            vfs,
            registry,
            jobs,
        }
    }

    /// Fresh interpreter over empty collaborators, for unit tests.
    pub fn for_tests() -> Self {
        Self::new(
            Arc::new(Vfs::new(Arc::new(crate::content::ContentStore::new()))),
            Arc::new(CommandRegistry::new()),
            Arc::new(JobTable::new()),
        )
    }

    pub fn vfs(&self) -> Arc<Vfs> {
        self.vfs.clone()
    }

    pub fn registry(&self) -> Arc<CommandRegistry> {
        self.registry.clone()
    }

    pub fn jobs(&self) -> Arc<JobTable> {
        self.jobs.clone()
    }

    /// Parse and execute a source string. Returns the final exit code;
    /// `state.last_exit_code` is updated to match.
    pub async fn run(
        &self,
        state: &mut ShellState,
        source: &str,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> i32 {
        let code = self.exec_source(state, source, io, cancel).await.code();
        state.last_exit_code = code;
        code
    }

    /// Like `run` but control flow is visible to the caller (`source`
    /// builtin, startup files).
    pub(crate) async fn exec_source(
        &self,
        state: &mut ShellState,
        source: &str,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        match parse(source) {
            Ok(script) => self.exec_script(state, &script, io, cancel).await,
            Err(e) => {
                io.stderr.write(&format!("vosh: {}\n", e));
                Flow::Code(EXIT_SYNTAX)
            }
        }
    }

    /// Run `source` for command substitution: cloned state, captured
    /// stdout, pass-through stderr.
    pub(crate) async fn run_substitution(
        &self,
        state: &mut ShellState,
        source: &str,
        cancel: &CancellationToken,
        stderr: Arc<dyn OutputStream>,
    ) -> Result<(String, i32), ExpandError> {
        let script =
            parse(source).map_err(|e| ExpandError::new(format!("command substitution: {}", e)))?;
        let mut sub_state = state.clone();
        let buffer = crate::exec::context::BufferedWriter::new();
        let mut io = ExecIo::new(Arc::new(buffer.clone()), stderr);
        let flow = self.exec_script(&mut sub_state, &script, &mut io, cancel).await;
        Ok((buffer.take(), flow.code()))
    }

    // ------------------------------------------------------------------
    // Scripts and lists
    // ------------------------------------------------------------------

    pub(crate) async fn exec_script(
        &self,
        state: &mut ShellState,
        script: &Script,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        let mut last = Flow::OK;
        for list in &script.lists {
            let flow = self.exec_list(state, list, io, cancel).await;
            state.last_exit_code = flow.code();
            if flow.is_control() {
                return flow;
            }
            last = flow;
        }
        last
    }

    async fn exec_list(
        &self,
        state: &mut ShellState,
        list: &List,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        if list.background {
            return self.spawn_background(state, list, io);
        }

        let mut last = Flow::OK;
        for (i, entry) in list.entries.iter().enumerate() {
            if i > 0 {
                let previous = last.code();
                let skip = match entry.connector {
                    Connector::AndIf => previous != 0,
                    Connector::OrIf => previous == 0,
                    Connector::None => false,
                };
                if skip {
                    continue;
                }
            }
            let flow = self.exec_pipeline(state, &entry.pipeline, io, cancel).await;
            state.last_exit_code = flow.code();
            if flow.is_control() {
                return flow;
            }
            last = flow;
        }
        last
    }

    /// Register the list as a job and return immediately with exit 0.
    fn spawn_background(&self, state: &mut ShellState, list: &List, io: &ExecIo) -> Flow {
        let interp = self.clone();
        let mut task_state = state.clone();
        let foreground = List {
            entries: list.entries.clone(),
            background: false,
        };
        let token = CancellationToken::new();
        let task_token = token.clone();
        let stdout = io.stdout.clone();
        let stderr = io.stderr.clone();

        let handle = tokio::spawn(async move {
            let mut io = ExecIo::new(stdout, stderr);
            interp
                .exec_list(&mut task_state, &foreground, &mut io, &task_token)
                .await
                .code()
        });

        let cmdline = format!("{} &", render_list(list));
        let id = self.jobs.add(cmdline, token, handle, None);
        state.last_background_pid = Some(id + 1);
        Flow::OK
    }

    // ------------------------------------------------------------------
    // Pipelines
    // ------------------------------------------------------------------

    async fn exec_pipeline(
        &self,
        state: &mut ShellState,
        pipeline: &Pipeline,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        let flow = if pipeline.commands.len() == 1 {
            self.exec_compound(state, &pipeline.commands[0], io, cancel)
                .await
        } else {
            self.exec_pipeline_stages(state, &pipeline.commands, io, cancel)
                .await
        };

        if pipeline.negated {
            match flow {
                Flow::Code(code) => Flow::Code(if code == 0 { 1 } else { 0 }),
                other => other,
            }
        } else {
            flow
        }
    }

    /// N concurrent stages joined by pipe channels; exit code of the
    /// last stage. Each stage runs on its own clone of the state.
    async fn exec_pipeline_stages(
        &self,
        state: &mut ShellState,
        commands: &[CompoundCommand],
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        let n = commands.len();
        let mut writers = Vec::with_capacity(n - 1);
        let mut readers = Vec::with_capacity(n - 1);
        for _ in 0..n - 1 {
            let (writer, reader) = pipe_channel();
            writers.push(writer);
            readers.push(reader);
        }
        // Reverse so stage i can pop its reader (stage i reads channel
        // i-1) while iterating forward.
        readers.reverse();

        let mut handles = Vec::with_capacity(n);
        let mut outer_stdin = io.stdin.take();
        let mut writers = writers.into_iter();

        for (i, command) in commands.iter().enumerate() {
            let stage_token = cancel.child_token();
            let stdin: Option<Box<dyn crate::exec::context::InputStream>> = if i == 0 {
                outer_stdin.take()
            } else {
                Some(Box::new(
                    readers.pop().expect("reader per stage").with_cancel(stage_token.clone()),
                ))
            };
            let stdout: Arc<dyn OutputStream> = if i == n - 1 {
                io.stdout.clone()
            } else {
                // A producer whose reader goes away gets its token
                // tripped, the cooperative stand-in for SIGPIPE.
                Arc::new(
                    writers
                        .next()
                        .expect("writer per stage")
                        .with_broken_pipe(stage_token.clone()),
                )
            };

            let interp = self.clone();
            let mut stage_state = state.clone();
            let stage_command = command.clone();
            let stderr = io.stderr.clone();

            handles.push(tokio::spawn(async move {
                let mut stage_io = ExecIo {
                    stdout,
                    stderr,
                    stdin,
                };
                let flow = interp
                    .exec_compound(&mut stage_state, &stage_command, &mut stage_io, &stage_token)
                    .await;
                flow.code()
            }));
        }

        let mut exit = 0;
        for handle in handles {
            exit = handle.await.unwrap_or(1);
        }
        Flow::Code(exit)
    }

    // ------------------------------------------------------------------
    // Compound commands
    // ------------------------------------------------------------------

    #[async_recursion]
    pub(crate) async fn exec_compound(
        &self,
        state: &mut ShellState,
        command: &CompoundCommand,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        if cancel.is_cancelled() {
            return Flow::Code(EXIT_INTERRUPT);
        }

        match command {
            CompoundCommand::Simple(cmd) => return self.exec_simple(state, cmd, io, cancel).await,
            CompoundCommand::FunctionDef(def) => {
                state
                    .functions
                    .insert(def.name.clone(), (*def.body).clone());
                return Flow::OK;
            }
            _ => {}
        }

        // Remaining forms share the trailing-redirection treatment: the
        // rewired I/O scopes over every command in the body.
        let redirections = compound_redirections(command);
        if redirections.is_empty() {
            return self.exec_compound_body(state, command, io, cancel).await;
        }

        let stdin = io.stdin.take();
        let mut plan = match self
            .plan_redirections(state, redirections, io, stdin, cancel)
            .await
        {
            Ok(plan) => plan,
            Err(message) => {
                io.stderr.write(&format!("vosh: {}\n", message));
                return Flow::Code(1);
            }
        };

        let flow = self
            .exec_compound_body(state, command, &mut plan.io, cancel)
            .await;
        if let Some(unused) = plan.io.stdin.take() {
            io.stdin = Some(unused);
        }
        if let Err(message) = plan.flush(self).await {
            io.stderr.write(&format!("vosh: {}\n", message));
            return Flow::Code(1);
        }
        flow
    }

    async fn exec_compound_body(
        &self,
        state: &mut ShellState,
        command: &CompoundCommand,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        match command {
            CompoundCommand::If(cmd) => {
                for clause in &cmd.clauses {
                    let cond = self.exec_body(state, &clause.condition, io, cancel).await;
                    if cond.is_control() {
                        return cond;
                    }
                    if cond.code() == 0 {
                        return self.exec_body(state, &clause.body, io, cancel).await;
                    }
                }
                match &cmd.else_body {
                    Some(body) => self.exec_body(state, body, io, cancel).await,
                    None => Flow::OK,
                }
            }
            CompoundCommand::For(cmd) => self.exec_for(state, cmd, io, cancel).await,
            CompoundCommand::While(cmd) => {
                self.exec_while_until(state, &cmd.condition, &cmd.body, false, io, cancel)
                    .await
            }
            CompoundCommand::Until(cmd) => {
                self.exec_while_until(state, &cmd.condition, &cmd.body, true, io, cancel)
                    .await
            }
            CompoundCommand::Case(cmd) => self.exec_case(state, cmd, io, cancel).await,
            CompoundCommand::Group(cmd) => self.exec_body(state, &cmd.body, io, cancel).await,
            CompoundCommand::Simple(_) | CompoundCommand::FunctionDef(_) => {
                unreachable!("handled by exec_compound")
            }
        }
    }

    /// Execute a body of lists sequentially.
    async fn exec_body(
        &self,
        state: &mut ShellState,
        body: &[List],
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        let mut last = Flow::OK;
        for list in body {
            let flow = self.exec_list(state, list, io, cancel).await;
            state.last_exit_code = flow.code();
            if flow.is_control() {
                return flow;
            }
            last = flow;
        }
        last
    }

    // ------------------------------------------------------------------
    // Loops, case
    // ------------------------------------------------------------------

    async fn exec_for(
        &self,
        state: &mut ShellState,
        cmd: &ForCommand,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        let items = match &cmd.words {
            Some(words) => {
                let mut expander = Expander::new(self, state, cancel, io.stderr.clone());
                match expander.expand_words(words).await {
                    Ok(items) => items,
                    Err(e) => {
                        io.stderr.write(&format!("vosh: {}\n", e.message));
                        return Flow::Code(1);
                    }
                }
            }
            None => state.positional_params.clone(),
        };

        let mut last_code = 0;
        'outer: for item in items {
            if cancel.is_cancelled() {
                return Flow::Code(EXIT_INTERRUPT);
            }
            state.set_env(cmd.variable.clone(), item);
            let flow = self.exec_body(state, &cmd.body, io, cancel).await;
            match flow {
                Flow::Code(code) => last_code = code,
                Flow::Break(n) if n <= 1 => break 'outer,
                Flow::Break(n) => return Flow::Break(n - 1),
                Flow::Continue(n) if n <= 1 => continue,
                Flow::Continue(n) => return Flow::Continue(n - 1),
                other => return other,
            }
            tokio::task::yield_now().await;
        }
        Flow::Code(last_code)
    }

    async fn exec_while_until(
        &self,
        state: &mut ShellState,
        condition: &[List],
        body: &[List],
        until: bool,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        let mut last_code = 0;
        loop {
            if cancel.is_cancelled() {
                return Flow::Code(EXIT_INTERRUPT);
            }
            let cond = self.exec_body(state, condition, io, cancel).await;
            if cond.is_control() {
                return cond;
            }
            let run_body = if until {
                cond.code() != 0
            } else {
                cond.code() == 0
            };
            if !run_body {
                break;
            }
            let flow = self.exec_body(state, body, io, cancel).await;
            match flow {
                Flow::Code(code) => last_code = code,
                Flow::Break(n) if n <= 1 => break,
                Flow::Break(n) => return Flow::Break(n - 1),
                Flow::Continue(n) if n <= 1 => {}
                Flow::Continue(n) => return Flow::Continue(n - 1),
                other => return other,
            }
            tokio::task::yield_now().await;
        }
        Flow::Code(last_code)
    }

    async fn exec_case(
        &self,
        state: &mut ShellState,
        cmd: &CaseCommand,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        let value = {
            let mut expander = Expander::new(self, state, cancel, io.stderr.clone());
            match expander.expand_word_text(&cmd.word).await {
                Ok(value) => value,
                Err(e) => {
                    io.stderr.write(&format!("vosh: {}\n", e.message));
                    return Flow::Code(1);
                }
            }
        };

        for arm in &cmd.arms {
            for pattern_word in &arm.patterns {
                let pattern = {
                    let mut expander = Expander::new(self, state, cancel, io.stderr.clone());
                    match expander.expand_word_pattern(pattern_word).await {
                        Ok(pattern) => pattern,
                        Err(e) => {
                            io.stderr.write(&format!("vosh: {}\n", e.message));
                            return Flow::Code(1);
                        }
                    }
                };
                if crate::interpreter::expansion::pattern::glob_match(&pattern, &value) {
                    return self.exec_body(state, &arm.body, io, cancel).await;
                }
            }
        }
        Flow::OK
    }

    // ------------------------------------------------------------------
    // Simple commands
    // ------------------------------------------------------------------

    async fn exec_simple(
        &self,
        state: &mut ShellState,
        cmd: &SimpleCommand,
        io: &mut ExecIo,
        cancel: &CancellationToken,
    ) -> Flow {
        // 1. Expansion.
        let mut argv = {
            let mut expander = Expander::new(self, state, cancel, io.stderr.clone());
            match expander.expand_words(&cmd.words).await {
                Ok(argv) => argv,
                Err(e) => {
                    io.stderr.write(&format!("vosh: {}\n", e.message));
                    return Flow::Code(1);
                }
            }
        };

        let mut assignments = Vec::with_capacity(cmd.assignments.len());
        for (name, word) in &cmd.assignments {
            let mut expander = Expander::new(self, state, cancel, io.stderr.clone());
            match expander.expand_word_text(word).await {
                Ok(value) => assignments.push((name.clone(), value)),
                Err(e) => {
                    io.stderr.write(&format!("vosh: {}\n", e.message));
                    return Flow::Code(1);
                }
            }
        }

        // 2. Assignment-only command mutates the shell state.
        if argv.is_empty() {
            for (name, value) in assignments {
                state.set_env(name, value);
            }
            if !cmd.redirections.is_empty() {
                let stdin = io.stdin.take();
                match self
                    .plan_redirections(state, &cmd.redirections, io, stdin, cancel)
                    .await
                {
                    Ok(mut plan) => {
                        if let Some(unused) = plan.io.stdin.take() {
                            io.stdin = Some(unused);
                        }
                        if let Err(message) = plan.flush(self).await {
                            io.stderr.write(&format!("vosh: {}\n", message));
                            return Flow::Code(1);
                        }
                    }
                    Err(message) => {
                        io.stderr.write(&format!("vosh: {}\n", message));
                        return Flow::Code(1);
                    }
                }
            }
            return Flow::OK;
        }

        // 3. One-shot alias substitution on argv[0].
        if let Some(expansion) = state.aliases.get(&argv[0]).cloned() {
            match self.alias_words(state, &expansion, io, cancel).await {
                Ok(mut alias_argv) => {
                    alias_argv.extend(argv.into_iter().skip(1));
                    argv = alias_argv;
                }
                Err(e) => {
                    io.stderr.write(&format!("vosh: {}\n", e.message));
                    return Flow::Code(1);
                }
            }
            if argv.is_empty() {
                return Flow::OK;
            }
        }

        // Loop/function control words resolve ahead of the builtin table.
        match argv[0].as_str() {
            "break" => return Flow::Break(parse_level(argv.get(1))),
            "continue" => return Flow::Continue(parse_level(argv.get(1))),
            "return" => {
                let code = argv
                    .get(1)
                    .and_then(|a| a.parse().ok())
                    .unwrap_or(state.last_exit_code);
                return Flow::Return(code);
            }
            _ => {}
        }

        // 4/5. Redirections; a failed open skips the command.
        let stdin = io.stdin.take();
        let mut plan = match self
            .plan_redirections(state, &cmd.redirections, io, stdin, cancel)
            .await
        {
            Ok(plan) => plan,
            Err(message) => {
                io.stderr.write(&format!("vosh: {}\n", message));
                return Flow::Code(1);
            }
        };

        // 6. Resolve and invoke: builtin > function > registry.
        let name = argv[0].clone();
        let args: Vec<String> = argv[1..].to_vec();

        let flow = if let Some(builtin) = state.builtins.get(&name).cloned() {
            let saved = apply_assignments(state, &assignments);
            let mut ctx = BuiltinCtx {
                interp: self,
                state,
                io: &mut plan.io,
                cancel,
            };
            let flow = builtin.run(&mut ctx, &args).await;
            restore_assignments(state, saved);
            flow
        } else if let Some(body) = state.functions.get(&name).cloned() {
            let saved = apply_assignments(state, &assignments);
            let saved_positionals = std::mem::replace(&mut state.positional_params, args);
            let flow = self.exec_compound(state, &body, &mut plan.io, cancel).await;
            state.positional_params = saved_positionals;
            restore_assignments(state, saved);
            match flow {
                Flow::Return(code) => Flow::Code(code),
                other => other,
            }
        } else if let Some(command) = self.registry.resolve(&name) {
            let mut env = state.env.clone();
            for (assign_name, value) in &assignments {
                env.insert(assign_name.clone(), value.clone());
            }
            let ctx = CommandContext {
                args,
                env,
                cwd: state.cwd.clone(),
                vfs: self.vfs.clone(),
                stdout: plan.io.stdout.clone(),
                stderr: plan.io.stderr.clone(),
                stdin: plan.io.stdin.take(),
                signal: cancel.clone(),
                set_raw_mode: None,
                registry: Some(self.registry.clone()),
            };
            match command.run(ctx).await {
                Ok(code) => Flow::Code(code),
                Err(e) => {
                    plan.io.stderr.write(&format!("{}: {}\n", name, e));
                    Flow::Code(1)
                }
            }
        } else {
            plan.io
                .stderr
                .write(&format!("{}: command not found\n", name));
            Flow::Code(EXIT_NOT_FOUND)
        };

        // 7. Flush captured output; hand back any stdin the command
        // never consumed so later commands in the line still see it.
        if let Some(unused) = plan.io.stdin.take() {
            io.stdin = Some(unused);
        }
        if let Err(message) = plan.flush(self).await {
            io.stderr.write(&format!("vosh: {}\n", message));
            return Flow::Code(1);
        }
        flow
    }

    /// Expand an alias body into words.
    async fn alias_words(
        &self,
        state: &mut ShellState,
        expansion: &str,
        io: &ExecIo,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ExpandError> {
        let tokens =
            crate::parser::tokenize(expansion).map_err(|e| ExpandError::new(e.message))?;
        let words: Vec<Word> = tokens
            .into_iter()
            .filter_map(|t| match t.kind {
                crate::parser::TokenKind::Word(parts) => Some(Word { parts }),
                _ => None,
            })
            .collect();
        let mut expander = Expander::new(self, state, cancel, io.stderr.clone());
        expander.expand_words(&words).await
    }
}

/// Trailing redirections of a compound form.
fn compound_redirections(command: &CompoundCommand) -> &[Redirection] {
    match command {
        CompoundCommand::If(cmd) => &cmd.redirections,
        CompoundCommand::For(cmd) => &cmd.redirections,
        CompoundCommand::While(cmd) => &cmd.redirections,
        CompoundCommand::Until(cmd) => &cmd.redirections,
        CompoundCommand::Case(cmd) => &cmd.redirections,
        CompoundCommand::Group(cmd) => &cmd.redirections,
        CompoundCommand::Simple(_) | CompoundCommand::FunctionDef(_) => &[],
    }
}

fn parse_level(arg: Option<&String>) -> u32 {
    arg.and_then(|a| a.parse().ok()).filter(|&n| n >= 1).unwrap_or(1)
}

/// Apply `FOO=bar` prefixes, returning the values to restore.
fn apply_assignments(
    state: &mut ShellState,
    assignments: &[(String, String)],
) -> Vec<(String, Option<String>)> {
    let mut saved = Vec::with_capacity(assignments.len());
    for (name, value) in assignments {
        saved.push((name.clone(), state.env.get(name).cloned()));
        state.set_env(name.clone(), value.clone());
    }
    saved
}

fn restore_assignments(state: &mut ShellState, saved: Vec<(String, Option<String>)>) {
    for (name, previous) in saved {
        match previous {
            Some(value) => {
                state.env.insert(name, value);
            }
            None => {
                state.env.remove(&name);
            }
        }
    }
}

// ----------------------------------------------------------------------
// Rendering (job command lines)
// ----------------------------------------------------------------------

pub fn render_word(word: &Word) -> String {
    word.parts
        .iter()
        .map(|part| match part {
            WordPart::Literal { text, quoting } => match quoting {
                Quoting::None => text.clone(),
                Quoting::Single | Quoting::AnsiC => format!("'{}'", text),
                Quoting::Double => format!("\"{}\"", text),
            },
            WordPart::Param { name, modifier, .. } => match modifier {
                None => format!("${}", name),
                Some(modifier) => format!("${{{}{}}}", name, modifier),
            },
            WordPart::Arith { expr, .. } => format!("$(({}))", expr),
            WordPart::CommandSub { source, .. } => format!("$({})", source),
        })
        .collect()
}

fn render_simple(cmd: &SimpleCommand) -> String {
    let mut pieces: Vec<String> = cmd
        .assignments
        .iter()
        .map(|(name, value)| format!("{}={}", name, render_word(value)))
        .collect();
    pieces.extend(cmd.words.iter().map(render_word));
    for redirection in &cmd.redirections {
        match &redirection.target {
            RedirTarget::Word(word) => {
                pieces.push(format!("{} {}", redirection.operator, render_word(word)))
            }
            RedirTarget::HereDoc { .. } => pieces.push("<<EOF".to_string()),
        }
    }
    pieces.join(" ")
}

fn render_compound(command: &CompoundCommand) -> String {
    match command {
        CompoundCommand::Simple(cmd) => render_simple(cmd),
        CompoundCommand::If(_) => "if …".to_string(),
        CompoundCommand::For(cmd) => format!("for {} …", cmd.variable),
        CompoundCommand::While(_) => "while …".to_string(),
        CompoundCommand::Until(_) => "until …".to_string(),
        CompoundCommand::Case(_) => "case …".to_string(),
        CompoundCommand::FunctionDef(def) => format!("{}() …", def.name),
        CompoundCommand::Group(_) => "{ …; }".to_string(),
    }
}

fn render_pipeline(pipeline: &Pipeline) -> String {
    let stages: Vec<String> = pipeline.commands.iter().map(render_compound).collect();
    let joined = stages.join(" | ");
    if pipeline.negated {
        format!("! {}", joined)
    } else {
        joined
    }
}

pub fn render_list(list: &List) -> String {
    let mut out = String::new();
    for (i, entry) in list.entries.iter().enumerate() {
        if i > 0 {
            out.push_str(match entry.connector {
                Connector::AndIf => " && ",
                Connector::OrIf => " || ",
                Connector::None => "; ",
            });
        }
        out.push_str(&render_pipeline(&entry.pipeline));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
