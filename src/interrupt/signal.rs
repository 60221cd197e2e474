//! One-shot shutdown flag shared across concurrent units.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// One-shot, idempotent shutdown flag.
///
/// Raised by the interrupt listener or the graceful exit path; once raised
/// it cannot be lowered. Clones share the same underlying flag. The flag is
/// readable without blocking, and tasks can await it asynchronously.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    raised: Arc<AtomicBool>,
    token: CancellationToken,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.
    ///
    /// Returns `true` iff this call was the first to raise it, which lets
    /// callers guard a once-only shutdown sequence.
    pub fn raise(&self) -> bool {
        let first = !self.raised.swap(true, Ordering::SeqCst);
        self.token.cancel();
        first
    }

    /// Check the flag without blocking.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Wait until the signal is raised.
    pub async fn raised(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_reports_first_caller_only() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_raised());
        assert!(signal.raise());
        assert!(!signal.raise());
        assert!(signal.is_raised());
    }

    #[test]
    fn clones_share_state() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        assert!(clone.raise());
        assert!(signal.is_raised());
        assert!(!signal.raise());
    }

    #[tokio::test]
    async fn raised_resolves_after_raise() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.raised().await });
        signal.raise();
        task.await.unwrap();
    }
}
