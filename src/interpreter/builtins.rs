//! Builtins
//!
//! Commands that run inside the shell process and mutate `ShellState`
//! directly. The table lives in the state so a host can replace entries —
//! an embedding that must intercept `exit` swaps in its own hook.
//! `break`/`continue`/`return` are handled by the interpreter before
//! lookup and are not in this table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::exec::context::{InputStream, OutputStream, StringInput};
use crate::interpreter::errors::Flow;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::state::{ExecIo, ShellState};
use crate::vfs::path;

/// Everything a builtin may touch.
pub struct BuiltinCtx<'a> {
    pub interp: &'a Interpreter,
    pub state: &'a mut ShellState,
    pub io: &'a mut ExecIo,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait Builtin: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow;
}

/// The stock builtin table.
pub fn default_builtins() -> HashMap<String, Arc<dyn Builtin>> {
    let builtins: Vec<Arc<dyn Builtin>> = vec![
        Arc::new(Cd),
        Arc::new(Pwd),
        Arc::new(Exit),
        Arc::new(Export),
        Arc::new(Unset),
        Arc::new(Alias),
        Arc::new(Unalias),
        Arc::new(True),
        Arc::new(False),
        Arc::new(Colon),
        Arc::new(Type),
        Arc::new(JobsCmd),
        Arc::new(Kill),
        Arc::new(Shift),
        Arc::new(Read),
        Arc::new(Source),
    ];
    let mut table: HashMap<String, Arc<dyn Builtin>> = builtins
        .into_iter()
        .map(|b| (b.name().to_string(), b))
        .collect();
    // `.` is the POSIX spelling of `source`.
    table.insert(".".to_string(), Arc::new(Source));
    table
}

// ----------------------------------------------------------------------
// Directory movement
// ----------------------------------------------------------------------

struct Cd;

#[async_trait]
impl Builtin for Cd {
    fn name(&self) -> &'static str {
        "cd"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        let target = match args.first().map(String::as_str) {
            None | Some("~") => ctx.state.get_env("HOME").unwrap_or("/").to_string(),
            Some("-") => match ctx.state.get_env("OLDPWD") {
                Some(old) => {
                    let old = old.to_string();
                    ctx.io.stdout.write(&format!("{}\n", old));
                    old
                }
                None => {
                    ctx.io.stderr.write("cd: OLDPWD not set\n");
                    return Flow::Code(1);
                }
            },
            Some(dir) => dir.to_string(),
        };

        let abs = path::resolve(&ctx.state.cwd, &target);
        match ctx.interp.vfs().stat(&abs).await {
            Ok(stat) if stat.kind.is_directory() => {
                let old = ctx.state.cwd.clone();
                ctx.state.set_env("OLDPWD", old);
                ctx.state.cwd = abs.clone();
                ctx.state.set_env("PWD", abs);
                Flow::OK
            }
            Ok(_) => {
                ctx.io
                    .stderr
                    .write(&format!("cd: {}: Not a directory\n", target));
                Flow::Code(1)
            }
            Err(_) => {
                ctx.io
                    .stderr
                    .write(&format!("cd: {}: No such file or directory\n", target));
                Flow::Code(1)
            }
        }
    }
}

struct Pwd;

#[async_trait]
impl Builtin for Pwd {
    fn name(&self) -> &'static str {
        "pwd"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, _args: &[String]) -> Flow {
        ctx.io.stdout.write(&format!("{}\n", ctx.state.cwd));
        Flow::OK
    }
}

// ----------------------------------------------------------------------
// Shell lifecycle
// ----------------------------------------------------------------------

struct Exit;

#[async_trait]
impl Builtin for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        let code = match args.first() {
            None => ctx.state.last_exit_code,
            Some(arg) => match arg.parse::<i32>() {
                Ok(code) => code & 0xff,
                Err(_) => {
                    ctx.io
                        .stderr
                        .write(&format!("exit: {}: numeric argument required\n", arg));
                    2
                }
            },
        };
        Flow::Exit(code)
    }
}

// ----------------------------------------------------------------------
// Environment
// ----------------------------------------------------------------------

struct Export;

#[async_trait]
impl Builtin for Export {
    fn name(&self) -> &'static str {
        "export"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        if args.is_empty() {
            let mut names: Vec<&String> = ctx.state.env.keys().collect();
            names.sort();
            for name in names {
                ctx.io.stdout.write(&format!(
                    "declare -x {}=\"{}\"\n",
                    name, ctx.state.env[name]
                ));
            }
            return Flow::OK;
        }
        for arg in args {
            if let Some((name, value)) = arg.split_once('=') {
                ctx.state.set_env(name.to_string(), value.to_string());
            }
            // A bare name is already visible; nothing to mark.
        }
        Flow::OK
    }
}

struct Unset;

#[async_trait]
impl Builtin for Unset {
    fn name(&self) -> &'static str {
        "unset"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        let mut functions_only = false;
        for arg in args {
            match arg.as_str() {
                "-f" => functions_only = true,
                "-v" => functions_only = false,
                name => {
                    if functions_only {
                        ctx.state.functions.remove(name);
                    } else {
                        ctx.state.env.remove(name);
                    }
                }
            }
        }
        Flow::OK
    }
}

// ----------------------------------------------------------------------
// Aliases
// ----------------------------------------------------------------------

struct Alias;

#[async_trait]
impl Builtin for Alias {
    fn name(&self) -> &'static str {
        "alias"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        if args.is_empty() {
            for (name, value) in &ctx.state.aliases {
                ctx.io
                    .stdout
                    .write(&format!("alias {}='{}'\n", name, value));
            }
            return Flow::OK;
        }
        let mut code = 0;
        for arg in args {
            match arg.split_once('=') {
                Some((name, value)) => {
                    ctx.state
                        .aliases
                        .insert(name.to_string(), value.to_string());
                }
                None => match ctx.state.aliases.get(arg) {
                    Some(value) => {
                        ctx.io.stdout.write(&format!("alias {}='{}'\n", arg, value));
                    }
                    None => {
                        ctx.io
                            .stderr
                            .write(&format!("alias: {}: not found\n", arg));
                        code = 1;
                    }
                },
            }
        }
        Flow::Code(code)
    }
}

struct Unalias;

#[async_trait]
impl Builtin for Unalias {
    fn name(&self) -> &'static str {
        "unalias"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        if args.first().map(String::as_str) == Some("-a") {
            ctx.state.aliases.clear();
            return Flow::OK;
        }
        let mut code = 0;
        for name in args {
            if ctx.state.aliases.shift_remove(name).is_none() {
                ctx.io
                    .stderr
                    .write(&format!("unalias: {}: not found\n", name));
                code = 1;
            }
        }
        Flow::Code(code)
    }
}

// ----------------------------------------------------------------------
// Trivia
// ----------------------------------------------------------------------

struct True;

#[async_trait]
impl Builtin for True {
    fn name(&self) -> &'static str {
        "true"
    }

    async fn run(&self, _ctx: &mut BuiltinCtx<'_>, _args: &[String]) -> Flow {
        Flow::OK
    }
}

struct False;

#[async_trait]
impl Builtin for False {
    fn name(&self) -> &'static str {
        "false"
    }

    async fn run(&self, _ctx: &mut BuiltinCtx<'_>, _args: &[String]) -> Flow {
        Flow::Code(1)
    }
}

struct Colon;

#[async_trait]
impl Builtin for Colon {
    fn name(&self) -> &'static str {
        ":"
    }

    async fn run(&self, _ctx: &mut BuiltinCtx<'_>, _args: &[String]) -> Flow {
        Flow::OK
    }
}

struct Type;

#[async_trait]
impl Builtin for Type {
    fn name(&self) -> &'static str {
        "type"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        let mut code = 0;
        for name in args {
            if let Some(value) = ctx.state.aliases.get(name) {
                ctx.io
                    .stdout
                    .write(&format!("{} is aliased to `{}'\n", name, value));
            } else if ctx.state.builtins.contains_key(name) {
                ctx.io
                    .stdout
                    .write(&format!("{} is a shell builtin\n", name));
            } else if ctx.state.functions.contains_key(name) {
                ctx.io.stdout.write(&format!("{} is a function\n", name));
            } else if ctx.interp.registry().contains(name) {
                ctx.io
                    .stdout
                    .write(&format!("{} is /usr/bin/{}\n", name, name));
            } else {
                ctx.io
                    .stderr
                    .write(&format!("type: {}: not found\n", name));
                code = 1;
            }
        }
        Flow::Code(code)
    }
}

// ----------------------------------------------------------------------
// Jobs
// ----------------------------------------------------------------------

struct JobsCmd;

#[async_trait]
impl Builtin for JobsCmd {
    fn name(&self) -> &'static str {
        "jobs"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, _args: &[String]) -> Flow {
        use crate::exec::jobs::JobState;
        for job in ctx.interp.jobs().list() {
            let state = match job.state {
                JobState::Running => "Running",
                JobState::Exited(_) => "Done",
                JobState::Signalled => "Terminated",
            };
            ctx.io
                .stdout
                .write(&format!("[{}]  {}\t\t{}\n", job.id, state, job.cmdline));
        }
        Flow::OK
    }
}

struct Kill;

#[async_trait]
impl Builtin for Kill {
    fn name(&self) -> &'static str {
        "kill"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        let mut force = false;
        let mut targets = Vec::new();
        for arg in args {
            match arg.as_str() {
                "-9" | "-KILL" | "-SIGKILL" => force = true,
                flag if flag.starts_with('-') => {}
                target => targets.push(target.to_string()),
            }
        }
        if targets.is_empty() {
            ctx.io.stderr.write("kill: usage: kill [-9] pid | %job\n");
            return Flow::Code(2);
        }

        let mut code = 0;
        for target in targets {
            let pid = if let Some(job_spec) = target.strip_prefix('%') {
                match job_spec
                    .parse::<u32>()
                    .ok()
                    .and_then(|id| ctx.interp.jobs().get(id))
                {
                    Some(job) => job.pid,
                    None => {
                        ctx.io
                            .stderr
                            .write(&format!("kill: {}: no such job\n", target));
                        code = 1;
                        continue;
                    }
                }
            } else {
                match target.parse::<u32>() {
                    Ok(pid) => pid,
                    Err(_) => {
                        ctx.io.stderr.write(&format!(
                            "kill: {}: arguments must be process or job IDs\n",
                            target
                        ));
                        code = 1;
                        continue;
                    }
                }
            };

            if let Err(message) = ctx.interp.jobs().kill(pid, force) {
                ctx.io.stderr.write(&format!("kill: {}\n", message));
                code = 1;
            }
        }
        Flow::Code(code)
    }
}

// ----------------------------------------------------------------------
// Positional parameters and input
// ----------------------------------------------------------------------

struct Shift;

#[async_trait]
impl Builtin for Shift {
    fn name(&self) -> &'static str {
        "shift"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        let n = match args.first() {
            None => 1,
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    ctx.io
                        .stderr
                        .write(&format!("shift: {}: numeric argument required\n", arg));
                    return Flow::Code(1);
                }
            },
        };
        if n > ctx.state.positional_params.len() {
            return Flow::Code(1);
        }
        ctx.state.positional_params.drain(..n);
        Flow::OK
    }
}

struct Read;

#[async_trait]
impl Builtin for Read {
    fn name(&self) -> &'static str {
        "read"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        let Some(stdin) = ctx.io.stdin.as_mut() else {
            return Flow::Code(1);
        };
        // Pull one chunk, keep one line, hand the rest back as stdin.
        let mut buffer = String::new();
        loop {
            match stdin.read().await {
                Some(chunk) => {
                    buffer.push_str(&chunk);
                    if buffer.contains('\n') {
                        break;
                    }
                }
                None => {
                    if buffer.is_empty() {
                        return Flow::Code(1);
                    }
                    break;
                }
            }
        }
        let (line, rest) = match buffer.split_once('\n') {
            Some((line, rest)) => (line.to_string(), rest.to_string()),
            None => (buffer, String::new()),
        };
        ctx.io.stdin = Some(Box::new(StringInput::new(rest)));

        let names: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
        if names.is_empty() {
            ctx.state.set_env("REPLY", line);
            return Flow::OK;
        }

        let ifs = ctx.state.ifs();
        let mut remaining = line.trim_matches(|c| ifs.contains(c)).to_string();
        for (i, name) in names.iter().enumerate() {
            if i == names.len() - 1 {
                ctx.state.set_env((*name).clone(), remaining.clone());
                break;
            }
            match remaining.split_once(|c| ifs.contains(c)) {
                Some((head, tail)) => {
                    ctx.state.set_env((*name).clone(), head.to_string());
                    remaining = tail.trim_start_matches(|c| ifs.contains(c)).to_string();
                }
                None => {
                    ctx.state.set_env((*name).clone(), remaining.clone());
                    remaining.clear();
                }
            }
        }
        Flow::OK
    }
}

// ----------------------------------------------------------------------
// Sourcing
// ----------------------------------------------------------------------

struct Source;

#[async_trait]
impl Builtin for Source {
    fn name(&self) -> &'static str {
        "source"
    }

    async fn run(&self, ctx: &mut BuiltinCtx<'_>, args: &[String]) -> Flow {
        let Some(file) = args.first() else {
            ctx.io.stderr.write("source: filename argument required\n");
            return Flow::Code(2);
        };
        let abs = path::resolve(&ctx.state.cwd, file);
        let content = match ctx.interp.vfs().read_file_string(&abs).await {
            Ok(content) => content,
            Err(e) => {
                ctx.io.stderr.write(&format!("source: {}\n", e));
                return Flow::Code(1);
            }
        };
        ctx.interp
            .exec_source(ctx.state, &content, ctx.io, ctx.cancel)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::context::BufferedWriter;

    fn test_io() -> (ExecIo, BufferedWriter, BufferedWriter) {
        let stdout = BufferedWriter::new();
        let stderr = BufferedWriter::new();
        (
            ExecIo::new(Arc::new(stdout.clone()), Arc::new(stderr.clone())),
            stdout,
            stderr,
        )
    }

    #[test]
    fn test_default_table() {
        let table = default_builtins();
        for name in ["cd", "pwd", "exit", "export", "unset", "alias", "jobs", "kill", "source", "."] {
            assert!(table.contains_key(name), "missing builtin {}", name);
        }
    }

    #[tokio::test]
    async fn test_cd_and_pwd() {
        let interp = Interpreter::for_tests();
        interp.vfs().mkdir("/somewhere", true).await.unwrap();
        let mut state = ShellState::default();
        let (mut io, stdout, _stderr) = test_io();
        let cancel = CancellationToken::new();
        let mut ctx = BuiltinCtx {
            interp: &interp,
            state: &mut state,
            io: &mut io,
            cancel: &cancel,
        };

        let flow = Cd.run(&mut ctx, &["/somewhere".to_string()]).await;
        assert_eq!(flow, Flow::OK);
        assert_eq!(ctx.state.cwd, "/somewhere");
        assert_eq!(ctx.state.get_env("PWD"), Some("/somewhere"));

        Pwd.run(&mut ctx, &[]).await;
        assert_eq!(stdout.contents(), "/somewhere\n");
    }

    #[tokio::test]
    async fn test_cd_missing_dir() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        let (mut io, _stdout, stderr) = test_io();
        let cancel = CancellationToken::new();
        let mut ctx = BuiltinCtx {
            interp: &interp,
            state: &mut state,
            io: &mut io,
            cancel: &cancel,
        };

        let flow = Cd.run(&mut ctx, &["/nope".to_string()]).await;
        assert_eq!(flow, Flow::Code(1));
        assert!(stderr.contents().contains("No such file or directory"));
    }

    #[tokio::test]
    async fn test_exit_codes() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        state.last_exit_code = 5;
        let (mut io, _stdout, _stderr) = test_io();
        let cancel = CancellationToken::new();
        let mut ctx = BuiltinCtx {
            interp: &interp,
            state: &mut state,
            io: &mut io,
            cancel: &cancel,
        };

        assert_eq!(Exit.run(&mut ctx, &[]).await, Flow::Exit(5));
        assert_eq!(Exit.run(&mut ctx, &["42".to_string()]).await, Flow::Exit(42));
    }

    #[tokio::test]
    async fn test_export_and_unset() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        let (mut io, _stdout, _stderr) = test_io();
        let cancel = CancellationToken::new();
        let mut ctx = BuiltinCtx {
            interp: &interp,
            state: &mut state,
            io: &mut io,
            cancel: &cancel,
        };

        Export.run(&mut ctx, &["KEY=value".to_string()]).await;
        assert_eq!(ctx.state.get_env("KEY"), Some("value"));
        Unset.run(&mut ctx, &["KEY".to_string()]).await;
        assert_eq!(ctx.state.get_env("KEY"), None);
    }

    #[tokio::test]
    async fn test_shift() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        state.positional_params = vec!["a".into(), "b".into(), "c".into()];
        let (mut io, _stdout, _stderr) = test_io();
        let cancel = CancellationToken::new();
        let mut ctx = BuiltinCtx {
            interp: &interp,
            state: &mut state,
            io: &mut io,
            cancel: &cancel,
        };

        Shift.run(&mut ctx, &[]).await;
        assert_eq!(ctx.state.positional_params, vec!["b", "c"]);
        Shift.run(&mut ctx, &["2".to_string()]).await;
        assert!(ctx.state.positional_params.is_empty());
        // Shifting past the end fails.
        assert_eq!(Shift.run(&mut ctx, &["1".to_string()]).await, Flow::Code(1));
    }

    #[tokio::test]
    async fn test_read_splits_line() {
        let interp = Interpreter::for_tests();
        let mut state = ShellState::default();
        let (mut io, _stdout, _stderr) = test_io();
        io.stdin = Some(Box::new(StringInput::new("one two three\nnext")));
        let cancel = CancellationToken::new();
        let mut ctx = BuiltinCtx {
            interp: &interp,
            state: &mut state,
            io: &mut io,
            cancel: &cancel,
        };

        Read.run(&mut ctx, &["a".to_string(), "b".to_string()]).await;
        assert_eq!(ctx.state.get_env("a"), Some("one"));
        assert_eq!(ctx.state.get_env("b"), Some("two three"));
    }
}
