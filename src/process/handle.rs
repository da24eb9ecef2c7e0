//! Supervised external processes.
//!
//! Each spawned child is owned by a small supervisor task that waits for it
//! to exit or for its kill token to fire. Everyone else holds a cheap
//! [`ProcessHandle`] that can observe the exit and request a kill.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::process::{ChildStdout, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// What to run.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Pipe stdout back to the caller instead of discarding it.
    pub capture_stdout: bool,
}

impl SpawnSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
            capture_stdout: false,
        }
    }

    /// Same spec with stdout piped.
    pub fn piped(mut self) -> Self {
        self.capture_stdout = true;
        self
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Whether the process was killed on request.
    pub killed: bool,
}

impl ProcessExit {
    fn from_status(status: std::io::Result<ExitStatus>) -> Self {
        match status {
            Ok(status) => Self {
                code: status.code(),
                killed: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed waiting for child process");
                Self {
                    code: None,
                    killed: false,
                }
            }
        }
    }

    fn killed() -> Self {
        Self {
            code: None,
            killed: true,
        }
    }

    /// Exited on its own with status 0.
    pub fn success(&self) -> bool {
        !self.killed && self.code == Some(0)
    }
}

struct HandleInner {
    id: u64,
    pid: Option<u32>,
    label: String,
    kill: CancellationToken,
    exit: watch::Receiver<Option<ProcessExit>>,
    stdout: Mutex<Option<ChildStdout>>,
}

/// Shared handle to a supervised process.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.inner.id)
            .field("pid", &self.inner.pid)
            .field("label", &self.inner.label)
            .field("exit", &self.exit_status())
            .finish()
    }
}

impl ProcessHandle {
    /// Pool-unique identifier (not the OS pid).
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// OS process id at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Exit status, once the process has ended.
    pub fn exit_status(&self) -> Option<ProcessExit> {
        *self.inner.exit.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_status().is_some()
    }

    /// Wait until the process has ended.
    pub async fn wait(&self) -> ProcessExit {
        let mut rx = self.inner.exit.clone();
        let result = rx.wait_for(Option::is_some).await.map(|exit| *exit);
        match result {
            Ok(Some(exit)) => exit,
            // Supervisor went away without reporting (runtime shutdown);
            // kill_on_drop already reaped the child.
            Ok(None) | Err(_) => ProcessExit::killed(),
        }
    }

    /// Take the piped stdout. Only the first caller gets it.
    pub fn take_stdout(&self) -> Option<ChildStdout> {
        self.inner.stdout.lock().take()
    }

    /// Request a kill. Idempotent; a no-op once the process has exited.
    pub(crate) fn kill(&self) {
        self.inner.kill.cancel();
    }
}

/// Spawn `spec` under a supervisor task.
///
/// `on_exit` runs on the supervisor task once the process has ended, before
/// the exit becomes visible through [`ProcessHandle::wait`], so bookkeeping
/// it performs is already done when waiters wake up.
pub(crate) fn spawn_supervised<F>(
    id: u64,
    label: impl Into<String>,
    spec: &SpawnSpec,
    on_exit: F,
) -> Result<ProcessHandle>
where
    F: FnOnce(u64, ProcessExit) + Send + 'static,
{
    let label = label.into();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(if spec.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| Error::spawn(&spec.program, &e))?;
    let pid = child.id();
    let stdout = child.stdout.take();

    let kill = CancellationToken::new();
    let (exit_tx, exit_rx) = watch::channel(None);

    tracing::debug!(id, pid, label = %label, program = %spec.program.display(), "spawned process");

    let token = kill.clone();
    let task_label = label.clone();
    tokio::spawn(async move {
        let exit = tokio::select! {
            status = child.wait() => ProcessExit::from_status(status),
            _ = token.cancelled() => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(id, error = %e, "kill failed, process likely already gone");
                }
                ProcessExit::killed()
            }
        };

        tracing::debug!(id, label = %task_label, code = ?exit.code, killed = exit.killed, "process exited");
        on_exit(id, exit);
        let _ = exit_tx.send(Some(exit));
    });

    Ok(ProcessHandle {
        inner: Arc::new(HandleInner {
            id,
            pid,
            label,
            kill,
            exit: exit_rx,
            stdout: Mutex::new(stdout),
        }),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn sleep_spec(secs: &str) -> SpawnSpec {
        SpawnSpec::new("sleep", vec![OsString::from(secs)])
    }

    #[tokio::test]
    async fn test_natural_exit_is_observed() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();
        let handle = spawn_supervised(1, "true", &SpawnSpec::new("true", vec![]), move |id, exit| {
            assert_eq!(id, 1);
            assert!(exit.success());
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        let exit = handle.wait().await;
        assert!(exit.success());
        assert!(handle.has_exited());
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_kill_terminates_process() {
        let handle = spawn_supervised(2, "sleep", &sleep_spec("30"), |_, _| {}).unwrap();
        assert!(handle.pid().is_some());
        assert!(!handle.has_exited());

        handle.kill();
        let exit = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("process should die promptly");
        assert!(exit.killed);
        assert!(!exit.success());

        // Killing again is a no-op.
        handle.kill();
    }

    #[tokio::test]
    async fn test_spawn_failure_is_synchronous() {
        let err = spawn_supervised(
            3,
            "missing",
            &SpawnSpec::new("nonexistent_binary_98765", vec![]),
            |_, _| {},
        )
        .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_stdout_is_taken_once() {
        let spec = SpawnSpec::new("echo", vec![OsString::from("hi")]).piped();
        let handle = spawn_supervised(4, "echo", &spec, |_, _| {}).unwrap();
        assert!(handle.take_stdout().is_some());
        assert!(handle.take_stdout().is_none());
        handle.wait().await;
    }
}
