//! Fire-and-forget background work tied to the engine's lifetime
//!
//! Audit records, outcome reports and grace-period evictions must never block
//! pacing or webhook handling, but they also must not outlive an engine that
//! has been shut down. Every task spawned here races a shared cancellation
//! token.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    cancel_token: CancellationToken,
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            active: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Spawn a task whose failure is logged rather than propagated
    pub fn spawn<F>(&self, name: impl Into<String>, future: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let cancel_token = self.cancel_token.clone();
        let active = self.active.clone();
        let idle = self.idle.clone();

        active.fetch_add(1, Ordering::AcqRel);
        tokio::spawn(async move {
            tokio::select! {
                result = future => {
                    if let Err(e) = result {
                        warn!("⚠️ Background task {} failed: {}", name, e);
                    }
                }
                _ = cancel_token.cancelled() => {
                    debug!("Background task {} cancelled", name);
                }
            }
            if active.fetch_sub(1, Ordering::AcqRel) == 1 {
                idle.notify_waiters();
            }
        });
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for pending tasks to finish on their own;
    /// returns false if some were still running
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Cancel everything still pending
    pub fn cancel_all(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
