//! Shell State
//!
//! Process-wide mutable state for one shell instance: environment,
//! aliases, functions, positional parameters, the builtin table, and the
//! job-table handle. Cloning produces the copy-on-write view handed to
//! command substitutions and pipeline stages, which share the job table
//! but mutate their own maps.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::types::CompoundCommand;
use crate::exec::context::{InputStream, OutputStream};
use crate::exec::jobs::JobTable;
use crate::interpreter::builtins::{self, Builtin};

/// Default field-splitting characters.
pub const DEFAULT_IFS: &str = " \t\n";

#[derive(Clone)]
pub struct ShellState {
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Alias definitions, in definition order
    pub aliases: IndexMap<String, String>,
    /// Shell functions, name → body
    pub functions: HashMap<String, CompoundCommand>,
    /// `$1…$n`
    pub positional_params: Vec<String>,
    /// `$?`
    pub last_exit_code: i32,
    /// Absolute working directory
    pub cwd: String,
    /// `$0`
    pub shell_name: String,
    /// `$!` — pid of the last background job
    pub last_background_pid: Option<u32>,
    /// Builtin table; the host may replace entries (notably `exit`)
    pub builtins: HashMap<String, Arc<dyn Builtin>>,
    /// Shared job table
    pub jobs: Arc<JobTable>,
}

impl ShellState {
    pub fn new(jobs: Arc<JobTable>) -> Self {
        Self {
            env: HashMap::new(),
            aliases: IndexMap::new(),
            functions: HashMap::new(),
            positional_params: Vec::new(),
            last_exit_code: 0,
            cwd: "/".to_string(),
            shell_name: "sh".to_string(),
            last_background_pid: None,
            builtins: builtins::default_builtins(),
            jobs,
        }
    }

    pub fn get_env(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn set_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
    }

    /// IFS characters, falling back to the default when unset.
    pub fn ifs(&self) -> String {
        self.env
            .get("IFS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_IFS.to_string())
    }

    /// `$$` — the virtual pid of the shell itself.
    pub fn shell_pid(&self) -> u32 {
        crate::exec::jobs::SHELL_PID
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new(Arc::new(JobTable::new()))
    }
}

/// The I/O triple a command or AST node executes against. `stdin` is
/// consumed by the first command that reads it.
pub struct ExecIo {
    pub stdout: Arc<dyn OutputStream>,
    pub stderr: Arc<dyn OutputStream>,
    pub stdin: Option<Box<dyn InputStream>>,
}

impl ExecIo {
    pub fn new(stdout: Arc<dyn OutputStream>, stderr: Arc<dyn OutputStream>) -> Self {
        Self {
            stdout,
            stderr,
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, stdin: Box<dyn InputStream>) -> Self {
        self.stdin = Some(stdin);
        self
    }

    /// A view sharing the writers but not the (consumable) stdin.
    pub fn without_stdin(&self) -> ExecIo {
        ExecIo {
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            stdin: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
