//! Scaling advice from current load.

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::ScalingConfig;
use crate::observability::metrics;
use crate::registry::resource::{Resource, ResourceId, ResourceStatus, TenantId};
use crate::registry::ResourceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDirection {
    Up,
    Down,
}

impl ScalingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingDirection::Up => "up",
            ScalingDirection::Down => "down",
        }
    }
}

impl fmt::Display for ScalingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingAdvice {
    pub resource: ResourceId,
    pub tenant: TenantId,
    pub region: String,
    pub load: u8,
    pub direction: ScalingDirection,
}

pub struct ScalingAdvisor {
    registry: ResourceRegistry,
    config: ScalingConfig,
}

impl ScalingAdvisor {
    pub fn new(registry: ResourceRegistry, config: ScalingConfig) -> Self {
        Self { registry, config }
    }

    fn assess(&self, resource: &Resource) -> Option<ScalingDirection> {
        let load = resource.capacity_load;
        if load > self.config.scale_up_above {
            Some(ScalingDirection::Up)
        } else if load > 0 && load < self.config.scale_down_below {
            Some(ScalingDirection::Down)
        } else {
            None
        }
    }

    /// Scan online resources and emit advice for those past a threshold.
    pub fn scan(&self) -> Vec<ScalingAdvice> {
        let mut advice = Vec::new();

        for resource in self.registry.all() {
            if resource.status != ResourceStatus::Online {
                continue;
            }
            let Some(direction) = self.assess(&resource) else {
                continue;
            };

            match direction {
                ScalingDirection::Up => tracing::warn!(
                    resource = %resource.id,
                    tenant = %resource.tenant_id,
                    region = %resource.region,
                    load = resource.capacity_load,
                    "High load, scale up advised"
                ),
                ScalingDirection::Down => tracing::info!(
                    resource = %resource.id,
                    tenant = %resource.tenant_id,
                    region = %resource.region,
                    load = resource.capacity_load,
                    "Low load, scale down advised"
                ),
            }
            metrics::record_scaling_advice(direction.as_str());

            advice.push(ScalingAdvice {
                resource: resource.id,
                tenant: resource.tenant_id,
                region: resource.region,
                load: resource.capacity_load,
                direction,
            });
        }

        advice
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Scaling advice disabled");
            return;
        }
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let advice = self.scan();
                    tracing::debug!(count = advice.len(), "Scaling scan complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Scaling advisor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
