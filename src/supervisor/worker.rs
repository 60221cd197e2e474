//! Worker process spawning and control.
//!
//! A [`WorkerHandle`] wraps one launched capability module as an OS child
//! process. The child inherits stdio, so display ownership passes to the
//! worker for its lifetime.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};

use crate::config::WorkerSpec;

/// Error type for worker launch operations.
#[derive(thiserror::Error, Debug)]
pub enum StartError {
    /// The worker's target does not exist on disk.
    #[error("Worker target not found: {0}")]
    NotFound(PathBuf),
    /// OS-level failure to spawn the worker.
    #[error("Failed to launch worker: {0}")]
    LaunchFailed(#[source] std::io::Error),
}

/// Lifecycle state of a worker.
///
/// A handle transitions to a terminal state exactly once; after that the
/// state never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawn requested, child not confirmed running yet.
    Starting,
    /// Child process is running.
    Running,
    /// Exited on its own with the given code, when known.
    Exited(Option<i32>),
    /// Exited after a cooperative terminate request.
    Terminated,
    /// Forcefully killed.
    Killed,
}

impl WorkerState {
    /// Whether this state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Starting | Self::Running)
    }
}

#[cfg(unix)]
fn exited_by_sigterm(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(nix::sys::signal::Signal::SIGTERM as i32)
}

#[cfg(not(unix))]
fn exited_by_sigterm(_status: &ExitStatus) -> bool {
    false
}

/// A launched worker process.
#[derive(Debug)]
pub struct WorkerHandle {
    spec: WorkerSpec,
    child: Child,
    pid: Option<u32>,
    started_at: Instant,
    state: WorkerState,
    terminate_requested: bool,
    kill_requested: bool,
}

impl WorkerHandle {
    /// Launch the worker described by `spec`, resolving its path against
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns `StartError::NotFound` when the resolved target does not
    /// exist, and `StartError::LaunchFailed` for any OS-level spawn failure.
    pub fn start(spec: &WorkerSpec, root: &Path) -> Result<Self, StartError> {
        let target = root.join(&spec.path);
        if !target.exists() {
            return Err(StartError::NotFound(target));
        }

        let mut cmd = Command::new(&target);
        cmd.args(&spec.args).current_dir(root);

        let child = cmd.spawn().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => StartError::NotFound(target.clone()),
            _ => StartError::LaunchFailed(err),
        })?;
        let pid = child.id();

        tracing::info!(worker = %spec.name, ?pid, target = %target.display(), "Worker started");

        Ok(Self {
            spec: spec.clone(),
            child,
            pid,
            started_at: Instant::now(),
            state: WorkerState::Running,
            terminate_requested: false,
            kill_requested: false,
        })
    }

    /// The spec this worker was launched from.
    #[must_use]
    pub fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    /// OS process id, if the child has not already been reaped.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the worker was launched.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Wait for the child to exit and record the terminal state.
    ///
    /// Blocks only the calling task; cancel-safe, the state is settled only
    /// once the child has actually exited.
    pub async fn wait(&mut self) -> WorkerState {
        match self.child.wait().await {
            Ok(status) => self.settle(&status),
            Err(err) => {
                tracing::warn!(worker = %self.spec.name, error = %err, "Wait on worker failed");
                self.settle_unknown()
            }
        }
    }

    /// Request cooperative termination (SIGTERM on Unix).
    ///
    /// Best-effort and non-blocking; signal delivery is a no-op on other
    /// platforms, where the force-kill fallback covers termination.
    pub fn request_terminate(&mut self) {
        self.terminate_requested = true;
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            if let Err(err) = kill(nix_pid, Signal::SIGTERM) {
                tracing::debug!(worker = %self.spec.name, error = %err, "SIGTERM delivery failed");
            }
        }
    }

    /// Forcefully kill the child, unconditionally.
    pub fn kill(&mut self) {
        self.kill_requested = true;
        if let Err(err) = self.child.start_kill() {
            tracing::debug!(worker = %self.spec.name, error = %err, "Kill delivery failed");
        }
    }

    /// Terminate gracefully with a bounded grace period, then force kill.
    ///
    /// Returns once the child has reached a terminal state.
    pub async fn shutdown(&mut self, grace: Duration) -> WorkerState {
        self.request_terminate();
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => self.settle(&status),
            Ok(Err(err)) => {
                tracing::warn!(worker = %self.spec.name, error = %err, "Wait on worker failed");
                self.settle_unknown()
            }
            Err(_) => {
                // Grace period elapsed, force kill.
                self.kill();
                match self.child.wait().await {
                    Ok(status) => self.settle(&status),
                    Err(err) => {
                        tracing::warn!(worker = %self.spec.name, error = %err, "Wait after kill failed");
                        self.settle_unknown()
                    }
                }
            }
        }
    }

    fn settle(&mut self, status: &ExitStatus) -> WorkerState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.state = if self.kill_requested {
            WorkerState::Killed
        } else if self.terminate_requested || exited_by_sigterm(status) {
            // A worker that traps the terminate signal and exits cleanly
            // still counts as terminated, not as a normal exit.
            WorkerState::Terminated
        } else {
            WorkerState::Exited(status.code())
        };
        self.state
    }

    fn settle_unknown(&mut self) -> WorkerState {
        if !self.state.is_terminal() {
            self.state = WorkerState::Exited(None);
        }
        self.state
    }
}
