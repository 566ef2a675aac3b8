//! Resource selection subsystem.
//!
//! # Data Flow
//! ```text
//! Connect request (tenant, constraints)
//!     → registry.list_eligible (Online, tenant scoped, filters ANDed)
//!     → drop candidates at or above max_load (if requested)
//!     → Apply selection strategy:
//!         - least_loaded.rs (minimum capacity_load)
//!         - weighted.rs (minimum load per unit of declared weight)
//!     → snapshot of the chosen resource
//!     → allocate(): adjust_load(+1) wrapped in a LoadGuard (guard.rs)
//! ```
//!
//! # Design Decisions
//! - Selector is stateless and never retries; callers own retry policy
//! - Servers and nodes share one code path; kind is a constraint
//! - Ties break on freshest health check, then on id, so picks are deterministic

pub mod guard;
pub mod least_loaded;
pub mod weighted;

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::{SelectionConfig, StrategyKind};
use crate::error::{AllocError, AllocResult};
use crate::observability::metrics;
use crate::registry::resource::{ProtocolType, Resource, ResourceKind, TenantId};
use crate::registry::ResourceRegistry;

pub use guard::LoadGuard;
pub use least_loaded::LeastLoaded;
pub use weighted::WeightedLeastLoaded;

/// Picks one resource out of a non-empty eligible set.
pub trait SelectionStrategy: Debug + Send + Sync {
    fn choose<'a>(&self, candidates: &'a [Resource]) -> Option<&'a Resource>;
}

/// Optional filters for a pick. Absent fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickConstraints {
    pub protocol: Option<ProtocolType>,
    pub region: Option<String>,
    pub kind: Option<ResourceKind>,
    /// Exclude resources whose load is at or above this value.
    pub max_load: Option<u8>,
}

impl PickConstraints {
    pub fn protocol(protocol: ProtocolType) -> Self {
        Self { protocol: Some(protocol), ..Self::default() }
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn of_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn below_load(mut self, max_load: u8) -> Self {
        self.max_load = Some(max_load);
        self
    }
}

/// Tie-break shared by all strategies once the load key is equal:
/// most recent health check first (never-checked last), then smallest id.
pub fn tie_break(a: &Resource, b: &Resource) -> Ordering {
    b.last_health_check
        .cmp(&a.last_health_check)
        .then_with(|| a.id.cmp(&b.id))
}

/// Deterministic least-loaded resource picker.
#[derive(Debug, Clone)]
pub struct Selector {
    registry: ResourceRegistry,
    strategy: Arc<dyn SelectionStrategy>,
}

impl Selector {
    /// Selector with the default least-loaded strategy.
    pub fn new(registry: ResourceRegistry) -> Self {
        Self::with_strategy(registry, Arc::new(LeastLoaded::new()))
    }

    pub fn with_strategy(registry: ResourceRegistry, strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self { registry, strategy }
    }

    /// Build from configuration.
    pub fn from_config(registry: ResourceRegistry, config: &SelectionConfig) -> Self {
        let strategy: Arc<dyn SelectionStrategy> = match config.strategy {
            StrategyKind::LeastLoaded => Arc::new(LeastLoaded::new()),
            StrategyKind::Weighted => Arc::new(WeightedLeastLoaded::new()),
        };
        Self::with_strategy(registry, strategy)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Pick the best eligible resource for `tenant`.
    ///
    /// The result is a point-in-time snapshot.
    pub fn pick(&self, tenant: &TenantId, constraints: &PickConstraints) -> AllocResult<Resource> {
        let mut candidates = self.registry.list_eligible_filtered(
            tenant,
            constraints.protocol,
            constraints.region.as_deref(),
            constraints.kind,
        );
        if let Some(max_load) = constraints.max_load {
            candidates.retain(|r| r.capacity_load < max_load);
        }

        match self.strategy.choose(&candidates) {
            Some(chosen) => {
                tracing::debug!(
                    tenant = %tenant,
                    resource = %chosen.id,
                    load = chosen.capacity_load,
                    candidates = candidates.len(),
                    "Resource picked"
                );
                metrics::record_pick("ok");
                Ok(chosen.clone())
            }
            None => {
                tracing::warn!(tenant = %tenant, constraints = ?constraints, "No suitable resource");
                metrics::record_pick("no_suitable_resource");
                Err(AllocError::NoSuitableResource { tenant: tenant.clone() })
            }
        }
    }

    /// Pick and account one connection. The guard gives the load back.
    pub fn allocate(&self, tenant: &TenantId, constraints: &PickConstraints) -> AllocResult<LoadGuard> {
        let chosen = self.pick(tenant, constraints)?;
        let load = self.registry.adjust_load(&chosen.id, 1)?;
        let mut resource = chosen;
        resource.capacity_load = load;
        Ok(LoadGuard::new(self.registry.clone(), resource))
    }
}
