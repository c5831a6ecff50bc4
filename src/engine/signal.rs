// src/engine/signal.rs

//! Cooperative termination, wired to SIGINT.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::{debug, info};

/// Shared flag the scheduler selects on. Cloning shares the flag.
///
/// Both SIGINT and programmatic termination requests funnel through this;
/// once requested, the scheduler stops submitting and returns
/// [`crate::errors::RundagError::Interrupted`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolve once termination has been requested.
    pub async fn wait(&self) {
        // Register before checking the flag so a request between the check
        // and the await is not lost.
        let notified = self.inner.notify.notified();
        if self.is_requested() {
            return;
        }
        notified.await;
    }
}

/// Wire SIGINT (ctrl+c) to the given shutdown signal.
///
/// One execution runs per process, so this is installed at run entry and
/// simply lives for the remainder of the process. If the host environment
/// does not permit signal registration (e.g. off the main thread),
/// registration is silently skipped.
pub fn install_ctrl_c(shutdown: &ShutdownSignal) {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Caught SIGINT (ctrl+c)");
                shutdown.request();
            }
            Err(err) => {
                debug!(error = %err, "signal registration unavailable; skipping SIGINT handling");
            }
        }
    });
}
