//! Active health monitoring.
//!
//! # Responsibilities
//! - Periodically probe every resource that is not Offline
//! - Apply the retry policy before degrading a resource
//! - Restore resources it degraded on the first successful probe; a
//!   Maintenance set by an admin is left alone

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::error::AllocError;
use crate::health::probe::{ProbeError, Prober, SharedHealthConfig};
use crate::health::state::FailureTracker;
use crate::observability::metrics;
use crate::registry::resource::{HealthStatus, Resource, ResourceId, ResourceStatus};
use crate::registry::ResourceRegistry;
use crate::resilience::retries::RetryPolicy;

/// What one probing round did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub probed: usize,
    pub healthy: usize,
    pub failed: usize,
    /// Moved Online → Maintenance this round.
    pub degraded: Vec<ResourceId>,
    /// Moved Maintenance → Online this round.
    pub recovered: Vec<ResourceId>,
}

enum Verdict {
    Healthy,
    Failed,
    Degraded,
    Recovered,
}

pub struct HealthMonitor {
    registry: ResourceRegistry,
    prober: Arc<dyn Prober>,
    config: SharedHealthConfig,
    failures: FailureTracker,
}

impl HealthMonitor {
    pub fn new(registry: ResourceRegistry, prober: Arc<dyn Prober>, config: SharedHealthConfig) -> Self {
        Self {
            registry,
            prober,
            config,
            failures: FailureTracker::new(),
        }
    }

    /// Replace the health settings; picked up by the next round.
    pub fn update_config(&self, config: HealthCheckConfig) {
        tracing::info!(
            interval_secs = config.interval_secs,
            failure_threshold = config.failure_threshold,
            "Health check config updated"
        );
        self.config.store(Arc::new(config));
    }

    /// Current consecutive failure count for a resource.
    pub fn consecutive_failures(&self, id: &ResourceId) -> u32 {
        self.failures.failures(id)
    }

    /// Probe on every tick until shutdown. `enabled` and `interval_secs`
    /// are re-read each tick, so a reload can pause, resume or re-pace the
    /// monitor.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let config = self.config.load_full();
        tracing::info!(
            enabled = config.enabled,
            interval = config.interval_secs,
            timeout_ms = config.timeout_ms,
            failure_threshold = config.failure_threshold,
            "Health monitor starting"
        );

        let mut period = Duration::from_secs(config.interval_secs.max(1));
        let mut ticker = time::interval(period);
        let mut paused = !config.enabled;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let config = self.config.load_full();
                    if config.enabled == paused {
                        paused = !config.enabled;
                        if paused {
                            tracing::info!("Active health checks paused");
                        } else {
                            tracing::info!("Active health checks resumed");
                        }
                    }

                    if !paused {
                        let report = self.run_once().await;
                        tracing::debug!(
                            probed = report.probed,
                            healthy = report.healthy,
                            failed = report.failed,
                            degraded = report.degraded.len(),
                            recovered = report.recovered.len(),
                            "Health round complete"
                        );
                    }

                    let wanted = Duration::from_secs(self.config.load().interval_secs.max(1));
                    if wanted != period {
                        period = wanted;
                        ticker = time::interval_at(time::Instant::now() + period, period);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every non-Offline resource once, concurrently.
    pub async fn run_once(&self) -> RoundReport {
        let policy = RetryPolicy::from_config(&self.config.load());
        let all = self.registry.all();

        let known: HashSet<ResourceId> = all.iter().map(|r| r.id.clone()).collect();
        self.failures.retain_known(&known);
        for resource in all.iter().filter(|r| r.status != ResourceStatus::Maintenance) {
            // Someone moved it out of Maintenance; a later Maintenance is theirs.
            self.failures.take_degraded(&resource.id);
        }

        let targets: Vec<Resource> = all
            .into_iter()
            .filter(|r| r.status != ResourceStatus::Offline)
            .collect();

        let policy = &policy;
        let verdicts = join_all(targets.iter().map(|resource| async move {
            let outcome = self.probe_with_retries(resource, policy).await;
            (resource.id.clone(), self.apply(resource, outcome, policy))
        }))
        .await;

        let mut report = RoundReport { probed: targets.len(), ..RoundReport::default() };
        for (id, verdict) in verdicts {
            match verdict {
                Some(Verdict::Healthy) => report.healthy += 1,
                Some(Verdict::Recovered) => {
                    report.healthy += 1;
                    report.recovered.push(id);
                }
                Some(Verdict::Failed) => report.failed += 1,
                Some(Verdict::Degraded) => {
                    report.failed += 1;
                    report.degraded.push(id);
                }
                None => {}
            }
        }
        report
    }

    async fn probe_with_retries(
        &self,
        resource: &Resource,
        policy: &RetryPolicy,
    ) -> Result<Duration, ProbeError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.prober.probe(resource).await {
                Ok(latency) => return Ok(latency),
                Err(e) if policy.should_retry(attempt, &e) => {
                    let delay = policy.backoff.delay(attempt);
                    tracing::debug!(resource = %resource.id, attempt, delay = ?delay, error = %e, "Re-probing");
                    time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Feed one probe outcome into the counters and the registry.
    fn apply(
        &self,
        resource: &Resource,
        outcome: Result<Duration, ProbeError>,
        policy: &RetryPolicy,
    ) -> Option<Verdict> {
        let id = &resource.id;
        let result = match outcome {
            Ok(latency) => self.on_success(id, latency),
            Err(error) => self.on_failure(id, error, policy),
        };
        match result {
            Ok(verdict) => Some(verdict),
            Err(AllocError::NotFound(_)) => {
                tracing::debug!(resource = %id, "Resource deleted during probe");
                self.failures.reset(id);
                None
            }
            Err(e) => {
                tracing::warn!(resource = %id, error = %e, "Failed to record health result");
                None
            }
        }
    }

    fn on_success(&self, id: &ResourceId, latency: Duration) -> Result<Verdict, AllocError> {
        self.failures.reset(id);
        self.registry.set_health(id, HealthStatus::Healthy)?;
        tracing::trace!(resource = %id, latency = ?latency, "Probe succeeded");

        if self.failures.take_degraded(id)
            && self.registry.transition(id, ResourceStatus::Maintenance, ResourceStatus::Online)?
        {
            tracing::info!(resource = %id, "Resource recovered");
            return Ok(Verdict::Recovered);
        }
        Ok(Verdict::Healthy)
    }

    fn on_failure(
        &self,
        id: &ResourceId,
        error: ProbeError,
        policy: &RetryPolicy,
    ) -> Result<Verdict, AllocError> {
        metrics::record_probe_failure(error.reason());
        let streak = self.failures.record_failure(id);

        if !policy.is_exhausted(streak) {
            tracing::warn!(
                resource = %id,
                error = %error,
                streak,
                threshold = policy.failure_threshold,
                "Health probe failed"
            );
            return Ok(Verdict::Failed);
        }

        self.registry.set_health(id, HealthStatus::Unhealthy)?;
        if self.registry.transition(id, ResourceStatus::Online, ResourceStatus::Maintenance)? {
            self.failures.mark_degraded(id);
            tracing::warn!(resource = %id, error = %error, streak, "Resource degraded to maintenance");
            return Ok(Verdict::Degraded);
        }
        Ok(Verdict::Failed)
    }
}
