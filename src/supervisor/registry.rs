//! Process supervisor: registry of active workers.
//!
//! The supervisor owns every [`WorkerHandle`] from launch until the handle
//! reaches a terminal state. One watcher task per worker waits on the child
//! and removes the registry entry on termination, so the registry never
//! holds a stale entry. Policy: at most one worker at a time; launch
//! requests while busy are rejected, never queued.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audit::EventLog;
use crate::config::WorkerSpec;
use crate::interrupt::ShutdownSignal;
use crate::supervisor::{StartError, WorkerHandle, WorkerState};

/// Grace period allowed for a worker to exit cooperatively before it is
/// forcefully killed.
pub const GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Error type for dispatch operations.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    /// A worker is already running; the request is dropped, not queued.
    #[error("A worker is already running")]
    AlreadyRunning,

    /// Shutdown has been signalled; no new workers may start.
    #[error("Shutdown in progress")]
    ShuttingDown,

    /// The worker failed to launch.
    #[error(transparent)]
    Start(#[from] StartError),
}

/// Registry entry for one in-flight worker.
///
/// The watcher task owns the [`WorkerHandle`] itself; the entry carries only
/// what the shutdown path needs.
#[derive(Debug)]
struct WorkerEntry {
    name: String,
    /// Cancelled to ask the watcher to run the terminate/kill sequence.
    stop: CancellationToken,
    /// Cancelled by the watcher once the handle is terminal and removed.
    exited: CancellationToken,
}

type Registry = Arc<Mutex<HashMap<Uuid, WorkerEntry>>>;

/// Supervisor owning the lifecycle of all active workers.
pub struct ProcessSupervisor {
    registry: Registry,
    root: PathBuf,
    grace: Duration,
    shutdown: ShutdownSignal,
    events: EventLog,
}

impl ProcessSupervisor {
    /// Create a supervisor resolving worker paths against `root`.
    #[must_use]
    pub fn new(root: PathBuf, shutdown: ShutdownSignal, events: EventLog) -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            root,
            grace: GRACE_PERIOD,
            shutdown,
            events,
        }
    }

    /// Override the grace period (for tests).
    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Launch a worker and register it.
    ///
    /// Returns immediately after the spawn; completion is handled by a
    /// background watcher that cleans up the registry whether the worker
    /// succeeds, crashes, or is terminated.
    ///
    /// # Errors
    ///
    /// `DispatchError::AlreadyRunning` if a worker is active,
    /// `DispatchError::ShuttingDown` once shutdown has been signalled, and
    /// `DispatchError::Start` when the spawn itself fails.
    pub async fn start_worker(&self, spec: &WorkerSpec) -> Result<(), DispatchError> {
        let mut registry = self.registry.lock().await;
        // Checked under the lock so a raise that precedes a stop_all snapshot
        // is always visible here; a spawn can never slip in after the final
        // sweep.
        if self.shutdown.is_raised() {
            return Err(DispatchError::ShuttingDown);
        }
        if !registry.is_empty() {
            return Err(DispatchError::AlreadyRunning);
        }

        let handle = WorkerHandle::start(spec, &self.root)?;

        let id = Uuid::new_v4();
        let entry = WorkerEntry {
            name: spec.name.clone(),
            stop: CancellationToken::new(),
            exited: CancellationToken::new(),
        };
        let stop = entry.stop.clone();
        let exited = entry.exited.clone();
        registry.insert(id, entry);
        drop(registry);

        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            Self::watch(id, handle, stop, exited, registry, events, grace).await;
        });

        Ok(())
    }

    /// Whether a worker is currently active.
    pub async fn is_busy(&self) -> bool {
        !self.registry.lock().await.is_empty()
    }

    /// Number of registered workers.
    pub async fn active_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Terminate every registered worker and wait until all are terminal.
    ///
    /// Per worker: cooperative terminate, bounded grace period, then force
    /// kill. Idempotent and safe to call concurrently; a call with an empty
    /// registry returns immediately. Cannot deadlock on a worker that is
    /// already exiting: its watcher still removes the entry and fires the
    /// exited token.
    pub async fn stop_all(&self) {
        let pending: Vec<(String, CancellationToken, CancellationToken)> = self
            .registry
            .lock()
            .await
            .values()
            .map(|entry| (entry.name.clone(), entry.stop.clone(), entry.exited.clone()))
            .collect();

        if pending.is_empty() {
            return;
        }

        for (name, stop, _) in &pending {
            tracing::info!(worker = %name, "Stopping worker");
            stop.cancel();
        }
        for (_, _, exited) in &pending {
            exited.cancelled().await;
        }
    }

    /// Per-worker watcher: waits for termination, updates the registry, and
    /// records the outcome. The only task that touches the handle after
    /// launch.
    async fn watch(
        id: Uuid,
        mut handle: WorkerHandle,
        stop: CancellationToken,
        exited: CancellationToken,
        registry: Registry,
        events: EventLog,
        grace: Duration,
    ) {
        let waited = tokio::select! {
            state = handle.wait() => Some(state),
            () = stop.cancelled() => None,
        };
        let state = match waited {
            Some(state) => state,
            None => handle.shutdown(grace).await,
        };

        let name = handle.spec().name.clone();
        let elapsed = handle.started_at().elapsed();

        registry.lock().await.remove(&id);

        match state {
            WorkerState::Exited(Some(0)) => {
                tracing::info!(worker = %name, "Worker finished");
            }
            WorkerState::Exited(code) => {
                // A worker crashing on its own is not escalated; the system
                // returns to an idle, ready-to-dispatch state.
                tracing::warn!(worker = %name, ?code, "Worker exited abnormally");
            }
            WorkerState::Terminated => {
                tracing::info!(worker = %name, "Worker terminated gracefully");
            }
            WorkerState::Killed => {
                tracing::warn!(worker = %name, "Worker killed after grace period");
            }
            WorkerState::Starting | WorkerState::Running => {
                tracing::error!(worker = %name, ?state, "Watcher finished with non-terminal state");
            }
        }

        if let Err(err) = events
            .record(
                "SUPERVISOR",
                &name,
                &format!("Worker finished: {state:?}"),
                Some(elapsed.as_secs_f64()),
            )
            .await
        {
            tracing::warn!(error = %err, "Failed to record worker exit event");
        }

        exited.cancel();
    }
}
