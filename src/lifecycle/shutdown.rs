//! Shutdown coordination for the background loops.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for spawned tasks, giving up after `deadline`.
///
/// Returns `true` when every task finished in time.
pub async fn drain(tasks: Vec<JoinHandle<()>>, deadline: Duration) -> bool {
    let join_all = futures_util::future::join_all(tasks);
    match tokio::time::timeout(deadline, join_all).await {
        Ok(results) => {
            for result in results {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Background task panicked");
                }
            }
            true
        }
        Err(_) => {
            tracing::warn!(deadline_secs = deadline.as_secs(), "Shutdown deadline reached with tasks still running");
            false
        }
    }
}
