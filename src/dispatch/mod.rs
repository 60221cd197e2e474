//! Top-level command dispatch loop.
//!
//! Obtains one transcript per iteration, classifies it, and routes it to the
//! supervisor. The loop never waits on a running worker: a fresh launch
//! request while one is busy is rejected with a notification, not queued.

use std::sync::Arc;

use crate::audit::EventLog;
use crate::command::Command;
use crate::config::WorkerSpec;
use crate::interrupt::ShutdownSignal;
use crate::supervisor::{DispatchError, ProcessSupervisor, StartError};
use crate::voice::{CommandSource, Feedback};

/// State of the dispatch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the next command.
    #[default]
    Idle,
    /// Routing a classified command.
    Dispatching,
    /// Loop has ended; terminal.
    Stopped,
}

/// The dispatcher control loop.
pub struct DispatchLoop<S, F> {
    source: S,
    feedback: F,
    supervisor: Arc<ProcessSupervisor>,
    shutdown: ShutdownSignal,
    events: EventLog,
    reading: WorkerSpec,
    detection: WorkerSpec,
    state: LoopState,
}

impl<S: CommandSource, F: Feedback> DispatchLoop<S, F> {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: S,
        feedback: F,
        supervisor: Arc<ProcessSupervisor>,
        shutdown: ShutdownSignal,
        events: EventLog,
        reading: WorkerSpec,
        detection: WorkerSpec,
    ) -> Self {
        Self {
            source,
            feedback,
            supervisor,
            shutdown,
            events,
            reading,
            detection,
            state: LoopState::Idle,
        }
    }

    /// Current loop state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until the Exit command or the shutdown signal.
    ///
    /// The blocking listen call itself is not interrupted by shutdown; the
    /// signal is observed at the next iteration boundary. The emergency path
    /// does not depend on this loop making progress.
    pub async fn run(&mut self) {
        self.notify("System ready. Say a command: read, detect, or exit.")
            .await;
        loop {
            if self.shutdown.is_raised() {
                self.state = LoopState::Stopped;
                return;
            }
            self.state = LoopState::Idle;

            // No speech detected is a no-op iteration, not an error.
            let Some(text) = self.source.listen().await else {
                continue;
            };
            self.state = LoopState::Dispatching;
            tracing::info!(transcript = %text, "Heard command");

            match Command::classify(&text) {
                Command::StartReading => {
                    let spec = self.reading.clone();
                    self.dispatch(&spec).await;
                }
                Command::StartDetection => {
                    let spec = self.detection.clone();
                    self.dispatch(&spec).await;
                }
                Command::Exit => {
                    // Raising first lets the once-only guard absorb an
                    // emergency trigger that fires mid-shutdown.
                    self.shutdown.raise();
                    self.supervisor.stop_all().await;
                    self.record("MAIN", "-", "System exit", None).await;
                    self.notify("Goodbye.").await;
                    self.state = LoopState::Stopped;
                    return;
                }
                Command::Unknown => {
                    self.record("MAIN", "-", &format!("Unknown command: {text}"), None)
                        .await;
                    self.notify("I didn't understand that.").await;
                }
            }
        }
    }

    async fn dispatch(&mut self, spec: &WorkerSpec) {
        if self.supervisor.is_busy().await {
            self.record("MAIN", &spec.name, "Dispatch rejected: worker busy", None)
                .await;
            self.notify("Another module is still running. Please wait.")
                .await;
            return;
        }

        match self.supervisor.start_worker(spec).await {
            Ok(()) => {
                self.record("MAIN", &spec.name, "Launching module", None).await;
                self.notify(&format!("Opening {} module.", spec.name)).await;
            }
            Err(DispatchError::AlreadyRunning) => {
                // Lost the race against a concurrent start.
                self.notify("Another module is still running. Please wait.")
                    .await;
            }
            Err(DispatchError::ShuttingDown) => {
                tracing::info!(worker = %spec.name, "Launch rejected, shutdown in progress");
            }
            Err(DispatchError::Start(StartError::NotFound(target))) => {
                self.record(
                    "MAIN",
                    &spec.name,
                    &format!("Module missing: {}", target.display()),
                    None,
                )
                .await;
                self.notify(&format!("Module {} not found.", spec.name)).await;
            }
            Err(DispatchError::Start(err)) => {
                self.record("MAIN", &spec.name, &format!("Launch error: {err}"), None)
                    .await;
                self.notify(&format!("Failed to launch {} module.", spec.name))
                    .await;
            }
        }
    }

    /// Best-effort notification; collaborator failure never aborts the loop.
    async fn notify(&self, message: &str) {
        if let Err(err) = self.feedback.notify(message).await {
            tracing::warn!(error = %err, "Feedback notification failed");
        }
    }

    /// Best-effort audit record; collaborator failure never aborts the loop.
    async fn record(&self, service: &str, subject: &str, message: &str, duration: Option<f64>) {
        if let Err(err) = self.events.record(service, subject, message, duration).await {
            tracing::warn!(error = %err, "Failed to record audit event");
        }
    }
}
