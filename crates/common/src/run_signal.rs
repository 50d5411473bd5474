//! One-shot start-up coordination signal.
//!
//! A `RunSignal` lets one worker announce "first successful cycle done" to any
//! number of waiters, including waiters that arrive after the announcement.
//!
//! # Guarantees
//!
//! - Exactly one transition from pending to complete, enforced by a
//!   compare-and-swap on the completion flag. Concurrent signalers race on the
//!   CAS; only the winner broadcasts.
//! - Every waiter observes completion exactly once, whether it subscribed
//!   before, during or after the transition. The broadcast is a `watch`
//!   channel whose value never goes back to `false`.
//! - Waiting is cancellable via [`RunSignal::wait_for_first_run_or_cancel`] so a
//!   shutting-down gated worker never blocks process exit.
//!
//! # Example
//!
//! ```rust,ignore
//! let signal = Arc::new(RunSignal::new());
//!
//! // Refresher: after the first successful cycle
//! signal.signal_first_run_completed();
//!
//! // Gated worker: before entering its main loop
//! signal.wait_for_first_run_or_cancel(&cancel_token).await?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors returned while waiting on a [`RunSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignalError {
    /// The wait was abandoned because the cancellation token fired first.
    #[error("Wait for first run was cancelled")]
    Cancelled,
}

/// Thread-safe one-shot completion broadcaster.
#[derive(Debug)]
pub struct RunSignal {
    completed: AtomicBool,
    sender: watch::Sender<bool>,
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSignal {
    /// Create a signal in the pending state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            completed: AtomicBool::new(false),
            sender,
        }
    }

    /// Lock-free read of the completion flag.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Mark the first run as completed and wake every waiter.
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// transition; later (or losing concurrent) calls return `false`.
    pub fn signal_first_run_completed(&self) -> bool {
        if self
            .completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        // send_replace stores the value even when no receiver is subscribed yet,
        // so late waiters see `true` immediately.
        self.sender.send_replace(true);
        debug!(target: "common.run_signal", "First run completed, waiters released");
        true
    }

    /// Wait until the first run has completed. Resolves to `true`.
    ///
    /// Returns immediately if the signal already fired.
    pub async fn wait_for_first_run(&self) -> bool {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so the channel cannot close while
        // this borrow is held; an error here would mean it never fired.
        // Bound to a local so the `Ref` temporary is dropped before `receiver`.
        #[allow(clippy::let_and_return)]
        let fired = receiver.wait_for(|done| *done).await.is_ok();
        fired
    }

    /// Wait until the first run has completed or `cancel_token` fires.
    ///
    /// # Errors
    ///
    /// Returns `SignalError::Cancelled` if cancellation wins. If both are ready,
    /// completion wins.
    pub async fn wait_for_first_run_or_cancel(
        &self,
        cancel_token: &CancellationToken,
    ) -> Result<(), SignalError> {
        tokio::select! {
            biased;
            _ = self.wait_for_first_run() => Ok(()),
            () = cancel_token.cancelled() => Err(SignalError::Cancelled),
        }
    }
}
