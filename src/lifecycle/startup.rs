//! Startup orchestration.
//!
//! # Responsibilities
//! - Seed the registry from the declared inventory
//! - Build selector, health monitor, reconciler and scaling advisor once
//! - Spawn the background loops on the shared shutdown signal
//! - Apply reloaded configuration to the running services

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;

use crate::capacity::{HttpCountSource, Reconciler, ScalingAdvisor};
use crate::config::AllocatorConfig;
use crate::health::{HealthMonitor, HttpProber, Prober, SharedHealthConfig};
use crate::lifecycle::shutdown::Shutdown;
use crate::registry::{InventoryDiff, ResourceRegistry};
use crate::selector::Selector;

/// The allocator's long-lived services, built once and passed explicitly.
pub struct Services {
    pub registry: ResourceRegistry,
    pub selector: Selector,
    pub monitor: Arc<HealthMonitor>,
    reconciler: Option<Reconciler>,
    advisor: Option<ScalingAdvisor>,
}

impl Services {
    /// Build services over an in-memory registry with the HTTP prober.
    pub fn build(config: &AllocatorConfig) -> Self {
        let health_config: SharedHealthConfig = Arc::new(ArcSwap::from_pointee(config.health_check.clone()));
        let prober: Arc<dyn Prober> = Arc::new(HttpProber::new(health_config.clone()));
        Self::build_with(config, ResourceRegistry::in_memory(), prober, health_config)
    }

    /// Build services over the given registry and prober.
    pub fn build_with(
        config: &AllocatorConfig,
        registry: ResourceRegistry,
        prober: Arc<dyn Prober>,
        health_config: SharedHealthConfig,
    ) -> Self {
        let diff = registry.apply_inventory(config.inventory());
        tracing::info!(
            resources = diff.added.len() + diff.updated.len(),
            strategy = ?config.selection.strategy,
            "Registry seeded from inventory"
        );

        let selector = Selector::from_config(registry.clone(), &config.selection);
        let monitor = Arc::new(HealthMonitor::new(registry.clone(), prober, health_config));

        let reconcile = &config.reconciliation;
        let reconciler = match (&reconcile.source_url, reconcile.enabled) {
            (Some(url), true) => {
                let source = HttpCountSource::new(url.clone(), Duration::from_millis(reconcile.source_timeout_ms));
                Some(Reconciler::new(
                    registry.clone(),
                    Box::new(source),
                    Duration::from_secs(reconcile.interval_secs.max(1)),
                ))
            }
            _ => None,
        };

        let advisor = config
            .scaling
            .enabled
            .then(|| ScalingAdvisor::new(registry.clone(), config.scaling.clone()));

        Self {
            registry,
            selector,
            monitor,
            reconciler,
            advisor,
        }
    }

    /// Spawn the background loops. Each loop is spawned at most once.
    pub fn spawn(&mut self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(self.monitor.clone().run(shutdown.subscribe())));

        if let Some(reconciler) = self.reconciler.take() {
            tasks.push(tokio::spawn(reconciler.run(shutdown.subscribe())));
        }
        if let Some(advisor) = self.advisor.take() {
            tasks.push(tokio::spawn(advisor.run(shutdown.subscribe())));
        }

        tracing::info!(tasks = tasks.len(), "Background loops started");
        tasks
    }

    /// Apply a reloaded configuration: health settings and inventory.
    ///
    /// Selection, reconciliation and scaling settings take effect on restart.
    pub fn apply_reload(&self, config: &AllocatorConfig) -> InventoryDiff {
        self.monitor.update_config(config.health_check.clone());
        let diff = self.registry.apply_inventory(config.inventory());
        tracing::info!(
            added = diff.added.len(),
            updated = diff.updated.len(),
            removed = diff.removed.len(),
            "Inventory reloaded"
        );
        diff
    }
}
