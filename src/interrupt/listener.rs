//! Emergency-stop listener.
//!
//! Runs for the lifetime of the program on its own task, independent of the
//! dispatch loop. On trigger it raises the shutdown signal, terminates every
//! worker through the same supervisor the dispatch loop uses, and then exits
//! the whole process. Process exit is the last statement, after supervisor
//! cleanup; outstanding watcher tasks are abandoned, not joined.

use std::sync::Arc;

use async_trait::async_trait;

use crate::interrupt::ShutdownSignal;
use crate::supervisor::ProcessSupervisor;

/// Exit code used when the emergency path force-terminates the process.
pub const EMERGENCY_EXIT_CODE: i32 = 130;

/// Pluggable source of emergency-stop triggers.
#[async_trait]
pub trait InterruptTrigger: Send {
    /// Resolve when the trigger fires. May be awaited repeatedly; extra
    /// fires after shutdown has begun are tolerated and ignored.
    async fn triggered(&mut self);
}

/// Console interrupt (Ctrl-C / SIGINT) trigger.
#[derive(Debug, Default)]
pub struct CtrlC;

#[async_trait]
impl InterruptTrigger for CtrlC {
    async fn triggered(&mut self) {
        if tokio::signal::ctrl_c().await.is_err() {
            // Handler installation failed; park instead of spinning the
            // caller's retry loop.
            tracing::error!("Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Watches an interrupt trigger and performs the emergency stop sequence.
pub struct InterruptListener<T> {
    trigger: T,
    supervisor: Arc<ProcessSupervisor>,
    shutdown: ShutdownSignal,
}

impl<T: InterruptTrigger + 'static> InterruptListener<T> {
    #[must_use]
    pub fn new(trigger: T, supervisor: Arc<ProcessSupervisor>, shutdown: ShutdownSignal) -> Self {
        Self {
            trigger,
            supervisor,
            shutdown,
        }
    }

    /// Spawn the listener for the lifetime of the program.
    ///
    /// When the trigger fires, the process terminates with
    /// [`EMERGENCY_EXIT_CODE`] after best-effort worker cleanup.
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_to_stop().await;
            std::process::exit(EMERGENCY_EXIT_CODE);
        })
    }

    /// Wait for the trigger, run one stop sequence, and return.
    ///
    /// The once-only guard lives in [`ShutdownSignal::raise`]: triggers that
    /// fire after shutdown has already begun are ignored rather than
    /// re-entering the sequence. Exposed separately from [`Self::spawn`] so
    /// the sequence is testable without terminating the test process.
    pub async fn run_to_stop(&mut self) {
        loop {
            self.trigger.triggered().await;
            if self.shutdown.raise() {
                break;
            }
            tracing::debug!("Interrupt fired during shutdown, ignoring");
        }
        tracing::warn!("Emergency stop triggered, terminating all workers");
        self.supervisor.stop_all().await;
    }
}
