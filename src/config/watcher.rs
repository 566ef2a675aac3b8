//! Configuration file watcher for hot reload.
//!
//! Only the inventory and the health section apply to a running daemon, so
//! a reload that changes neither is dropped here. Editors commonly emit
//! several modify events per save; those collapse into one update.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AllocatorConfig;

/// Whether `next` changes anything a running daemon applies live.
pub fn has_live_changes(current: &AllocatorConfig, next: &AllocatorConfig) -> bool {
    current.resources != next.resources || current.health_check != next.health_check
}

/// Watches the config file and forwards validated, changed configurations.
pub struct ConfigWatcher {
    path: PathBuf,
    current: AllocatorConfig,
    update_tx: mpsc::UnboundedSender<AllocatorConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration the daemon is running with.
    pub fn new(path: &Path, current: AllocatorConfig) -> (Self, mpsc::UnboundedReceiver<AllocatorConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Offer a freshly loaded config. Sends it when it differs from the last
    /// one sent; returns whether it was sent.
    fn offer(&mut self, next: AllocatorConfig) -> bool {
        if !has_live_changes(&self.current, &next) {
            tracing::debug!(path = ?self.path, "Config unchanged, skipping reload");
            return false;
        }
        self.current = next.clone();
        self.update_tx.send(next).is_ok()
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(mut self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => match load_config(&self.path) {
                    Ok(next) => {
                        if self.offer(next) {
                            tracing::info!(path = ?self.path, "Config reloaded");
                        }
                    }
                    Err(e) => {
                        tracing::error!(path = ?self.path, error = %e, "Config reload rejected, keeping current configuration");
                    }
                },
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
