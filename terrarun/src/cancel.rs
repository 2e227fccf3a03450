//! Cooperative cancellation shared between the signal listener, the batch
//! runner and per-process watchers.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug, Default)]
struct State {
    cancelled: Mutex<bool>,
    wakeup: Condvar,
}

/// Cloneable flag that, once triggered, stays triggered.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<State>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger cancellation and wake every waiter.
    pub fn cancel(&self) {
        let mut cancelled = self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.state.wakeup.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until cancelled or `timeout` elapses. Returns whether cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let cancelled = self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _) = self
            .state
            .wakeup
            .wait_timeout_while(cancelled, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }
}

/// Trigger `token` on SIGINT, SIGTERM or SIGHUP.
///
/// Can only be installed once per process.
pub fn install_signal_handler(token: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("operation cancelled");
        token.cancel();
    })
    .context("install signal handler")
}
