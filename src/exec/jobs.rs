//! Job/Process Table
//!
//! Bookkeeping for every background list and foreground pipeline. Jobs
//! are cooperative tasks: "killing" one trips its cancellation token, and
//! a forced kill also closes its stdin feed so a blocked read unwinds.
//! PID 1 is the shell itself and can never be killed.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// PID reserved for the shell.
pub const SHELL_PID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Exited(i32),
    Signalled,
}

/// Snapshot of one job for `list`/`get`.
#[derive(Clone)]
pub struct JobInfo {
    pub id: u32,
    pub pid: u32,
    pub cmdline: String,
    pub state: JobState,
}

struct JobEntry {
    info: JobInfo,
    token: CancellationToken,
    handle: Option<JoinHandle<i32>>,
    /// Closes the job's stdin feed on a forced kill
    stdin_close: Option<Box<dyn Fn() + Send + Sync>>,
}

pub struct JobTable {
    inner: Mutex<JobTableInner>,
}

struct JobTableInner {
    jobs: Vec<JobEntry>,
    next_id: u32,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(JobTableInner {
                jobs: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Register a task. Returns the job id; the job's pid is `id + 1` so
    /// pid 1 stays reserved for the shell.
    pub fn add(
        &self,
        cmdline: impl Into<String>,
        token: CancellationToken,
        handle: JoinHandle<i32>,
        stdin_close: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> u32 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.jobs.push(JobEntry {
            info: JobInfo {
                id,
                pid: id + 1,
                cmdline: cmdline.into(),
                state: JobState::Running,
            },
            token,
            handle: Some(handle),
            stdin_close,
        });
        id
    }

    pub fn list(&self) -> Vec<JobInfo> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .iter()
            .map(|j| j.info.clone())
            .collect()
    }

    pub fn get(&self, id: u32) -> Option<JobInfo> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| j.info.id == id)
            .map(|j| j.info.clone())
    }

    /// PID of the most recently added job (for `$!`).
    pub fn last_pid(&self) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .last()
            .map(|j| j.info.pid)
    }

    /// Trip a job's token by id. Returns false for unknown ids.
    pub fn cancel(&self, id: u32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.jobs.iter_mut().find(|j| j.info.id == id) {
            Some(job) => {
                job.token.cancel();
                job.info.state = JobState::Signalled;
                true
            }
            None => false,
        }
    }

    /// Kill by pid. `force` additionally closes the job's stdin feed.
    /// Pid 1 (the shell) is refused.
    pub fn kill(&self, pid: u32, force: bool) -> Result<(), String> {
        if pid == SHELL_PID {
            return Err(format!("({}) - operation not permitted", pid));
        }
        let mut inner = self.inner.lock().unwrap();
        let Some(job) = inner.jobs.iter_mut().find(|j| j.info.pid == pid) else {
            return Err(format!("({}) - no such process", pid));
        };
        job.token.cancel();
        job.info.state = JobState::Signalled;
        if force {
            if let Some(close) = &job.stdin_close {
                close();
            }
        }
        Ok(())
    }

    /// Reap terminated jobs: await their handles, record exit codes, and
    /// drop them from the table. Returns what was reaped.
    pub async fn collect_done(&self) -> Vec<JobInfo> {
        let mut finished = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            let mut i = 0;
            while i < inner.jobs.len() {
                let done = inner.jobs[i]
                    .handle
                    .as_ref()
                    .map(|h| h.is_finished())
                    .unwrap_or(true);
                if done {
                    finished.push(inner.jobs.remove(i));
                } else {
                    i += 1;
                }
            }
        }

        let mut reaped = Vec::new();
        for mut job in finished {
            let mut info = job.info.clone();
            if let Some(handle) = job.handle.take() {
                match handle.await {
                    Ok(code) if info.state == JobState::Running => {
                        info.state = JobState::Exited(code);
                    }
                    Ok(_) => {}
                    Err(_) => info.state = JobState::Signalled,
                }
            }
            reaped.push(info);
        }
        reaped
    }

    /// Running job count (signalled-but-unreaped jobs included).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle type the interpreter and builtins pass around.
pub type Jobs = Arc<JobTable>;

// ============================================================================
// Tests
// ============================================================================
