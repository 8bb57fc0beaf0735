//! Kernel
//!
//! Composes the runtime: content store, VFS, command registry, job
//! table, and the default environment. Boot creates the standard
//! filesystem layout and seeds `/etc` with the stock configuration
//! files, then hands out shells attached to a terminal or headless
//! script execution.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::commands::install_base_commands;
use crate::content::ContentStore;
use crate::exec::context::{BufferedWriter, OutputStream};
use crate::exec::jobs::JobTable;
use crate::exec::registry::CommandRegistry;
use crate::interpreter::state::{ExecIo, ShellState};
use crate::interpreter::Interpreter;
use crate::shell::{Shell, ShellOptions};
use crate::terminal::Terminal;

/// Boot-time options.
pub struct KernelOptions {
    pub hostname: String,
    /// Content-store byte budget; `None` = unbounded
    pub store_budget: Option<u64>,
    /// Extra environment entries layered over the defaults
    pub env: HashMap<String, String>,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            hostname: "vosh".to_string(),
            store_budget: Some(256 * 1024 * 1024),
            env: HashMap::new(),
        }
    }
}

pub struct Kernel {
    vfs: Arc<crate::vfs::Vfs>,
    registry: Arc<CommandRegistry>,
    jobs: Arc<JobTable>,
    options: KernelOptions,
}

impl Kernel {
    /// Build and boot: filesystem layout, configuration files, base
    /// commands.
    pub async fn boot(options: KernelOptions) -> Self {
        let store = Arc::new(ContentStore::with_budget(options.store_budget));
        let vfs = Arc::new(crate::vfs::Vfs::new(store));
        let registry = Arc::new(CommandRegistry::new());
        let jobs = Arc::new(JobTable::new());

        install_base_commands(&registry);

        let kernel = Self {
            vfs,
            registry,
            jobs,
            options,
        };
        kernel.create_layout().await;
        kernel
    }

    pub fn vfs(&self) -> Arc<crate::vfs::Vfs> {
        self.vfs.clone()
    }

    pub fn registry(&self) -> Arc<CommandRegistry> {
        self.registry.clone()
    }

    pub fn jobs(&self) -> Arc<JobTable> {
        self.jobs.clone()
    }

    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.vfs.clone(), self.registry.clone(), self.jobs.clone())
    }

    /// Fresh shell state with the default environment.
    pub fn new_state(&self) -> ShellState {
        let mut state = ShellState::new(self.jobs.clone());
        state.shell_name = "vosh".to_string();
        state.cwd = "/home/user".to_string();
        for (name, value) in self.default_env() {
            state.set_env(name, value);
        }
        for (name, value) in &self.options.env {
            state.set_env(name.clone(), value.clone());
        }
        state
    }

    /// Interactive shell attached to `term`.
    pub fn create_shell(&self, term: Arc<dyn Terminal>) -> Shell {
        Shell::new(
            self.interpreter(),
            self.new_state(),
            term,
            ShellOptions::default(),
        )
    }

    /// Run a script headless, capturing stdout and stderr.
    pub async fn run_script(&self, source: &str) -> (i32, String, String) {
        let mut state = self.new_state();
        self.run_script_with_state(&mut state, source).await
    }

    pub async fn run_script_with_state(
        &self,
        state: &mut ShellState,
        source: &str,
    ) -> (i32, String, String) {
        let stdout = BufferedWriter::new();
        let stderr = BufferedWriter::new();
        let mut io = ExecIo::new(
            Arc::new(stdout.clone()) as Arc<dyn OutputStream>,
            Arc::new(stderr.clone()) as Arc<dyn OutputStream>,
        );
        let cancel = CancellationToken::new();
        let interp = self.interpreter();
        let code = interp.run(state, source, &mut io, &cancel).await;
        (code, stdout.take(), stderr.take())
    }

    fn default_env(&self) -> Vec<(String, String)> {
        [
            ("HOME", "/home/user"),
            ("USER", "user"),
            ("PATH", "/usr/local/bin:/usr/bin:/bin"),
            ("SHELL", "/bin/sh"),
            ("PWD", "/home/user"),
            ("IFS", " \t\n"),
            ("LANG", "en_US.UTF-8"),
            ("TERM", "xterm-256color"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .chain(std::iter::once((
            "HOSTNAME".to_string(),
            self.options.hostname.clone(),
        )))
        .collect()
    }

    /// The standard directory layout and `/etc` seed files.
    async fn create_layout(&self) {
        for dir in [
            "/bin",
            "/etc",
            "/home",
            "/home/user",
            "/root",
            "/tmp",
            "/var",
            "/var/log",
            "/usr",
            "/usr/bin",
            "/usr/lib",
            "/usr/lib/node_modules",
            "/proc",
            "/dev",
            "/mnt",
        ] {
            if let Err(e) = self.vfs.mkdir(dir, true).await {
                log::warn!("boot: mkdir {} failed: {}", dir, e);
            }
        }

        let profile = "export PATH=/usr/local/bin:/usr/bin:/bin\nexport PS1='\\u@\\h:\\w\\$ '\n";
        let motd = format!("Welcome to vosh on {}.\n", self.options.hostname);
        let bashrc = "# ~/.bashrc\nalias ll='ls -l'\nalias la='ls -a'\n";

        let files: [(&str, String); 4] = [
            ("/etc/profile", profile.to_string()),
            ("/etc/motd", motd),
            ("/etc/hostname", format!("{}\n", self.options.hostname)),
            ("/home/user/.bashrc", bashrc.to_string()),
        ];
        for (path, content) in files {
            if let Err(e) = self.vfs.write_file(path, content.as_bytes()).await {
                log::warn!("boot: seed {} failed: {}", path, e);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_boot_layout() {
        let kernel = Kernel::boot(KernelOptions::default()).await;
        for path in [
            "/bin",
            "/etc",
            "/home/user",
            "/tmp",
            "/var/log",
            "/usr/lib/node_modules",
            "/proc",
            "/dev",
            "/mnt",
        ] {
            assert!(kernel.vfs().exists(path).await, "missing {}", path);
        }
        for file in ["/etc/profile", "/etc/motd", "/etc/hostname", "/home/user/.bashrc"] {
            assert!(kernel.vfs().exists(file).await, "missing {}", file);
        }
    }

    #[tokio::test]
    async fn test_default_env() {
        let kernel = Kernel::boot(KernelOptions::default()).await;
        let state = kernel.new_state();
        assert_eq!(state.get_env("HOME"), Some("/home/user"));
        assert_eq!(state.get_env("USER"), Some("user"));
        assert_eq!(state.get_env("PATH"), Some("/usr/local/bin:/usr/bin:/bin"));
        assert_eq!(state.get_env("SHELL"), Some("/bin/sh"));
        assert_eq!(state.get_env("IFS"), Some(" \t\n"));
        assert_eq!(state.get_env("HOSTNAME"), Some("vosh"));
        assert_eq!(state.cwd, "/home/user");
    }

    #[tokio::test]
    async fn test_hostname_option() {
        let kernel = Kernel::boot(KernelOptions {
            hostname: "testbox".to_string(),
            ..Default::default()
        })
        .await;
        let content = kernel.vfs().read_file_string("/etc/hostname").await.unwrap();
        assert_eq!(content, "testbox\n");
    }

    #[tokio::test]
    async fn test_run_script() {
        let kernel = Kernel::boot(KernelOptions::default()).await;
        let (code, stdout, stderr) = kernel.run_script("echo booted").await;
        assert_eq!(code, 0);
        assert_eq!(stdout, "booted\n");
        assert_eq!(stderr, "");
    }
}
