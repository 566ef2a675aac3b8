//! Per-resource probe failure tracking.
//!
//! # State Transitions
//! ```text
//! Online      → Maintenance: consecutive failures >= failure_threshold
//! Maintenance → Online:      one successful probe, if the monitor put it there
//! Offline:                   admin only, never probed
//! ```
//!
//! # Design Decisions
//! - Slow degradation, fast recovery
//! - Counters live in memory only and are not part of the resource
//! - Counters reset on any successful probe

use std::collections::HashSet;

use dashmap::{DashMap, DashSet};

use crate::registry::resource::ResourceId;

/// Consecutive probe failure counters, keyed by resource, plus the set of
/// resources the monitor itself moved to Maintenance.
#[derive(Debug, Default)]
pub struct FailureTracker {
    counters: DashMap<ResourceId, u32>,
    degraded: DashSet<ResourceId>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more failure and return the new streak length.
    pub fn record_failure(&self, id: &ResourceId) -> u32 {
        let mut entry = self.counters.entry(id.clone()).or_insert(0);
        *entry = entry.saturating_add(1);
        *entry
    }

    pub fn reset(&self, id: &ResourceId) {
        self.counters.remove(id);
    }

    pub fn failures(&self, id: &ResourceId) -> u32 {
        self.counters.get(id).map(|c| *c).unwrap_or(0)
    }

    pub fn mark_degraded(&self, id: &ResourceId) {
        self.degraded.insert(id.clone());
    }

    /// Clear the degraded mark, returning whether it was set.
    pub fn take_degraded(&self, id: &ResourceId) -> bool {
        self.degraded.remove(id).is_some()
    }

    pub fn is_degraded(&self, id: &ResourceId) -> bool {
        self.degraded.contains(id)
    }

    /// Forget state of resources that no longer exist.
    pub fn retain_known(&self, known: &HashSet<ResourceId>) {
        self.counters.retain(|id, _| known.contains(id));
        self.degraded.retain(|id| known.contains(id));
    }
}
