//! Resource registry subsystem.
//!
//! # Data Flow
//! ```text
//! Selector.pick → list_eligible (status == Online, tenant scoped)
//! Connect       → adjust_load(+1) → store.atomic_increment
//! Disconnect    → adjust_load(-1) → store.atomic_increment
//! Reconciler    → set_load(n)     → store.compare_and_set
//! HealthMonitor → set_health / set_status → store.compare_and_set
//! ```
//!
//! # Design Decisions
//! - `capacity_load` is the only contended field and goes through the
//!   store's atomic increment; everything else is last-write-wins over CAS
//! - No global lock; mutation is per resource
//! - Status transitions are unrestricted (no terminal state)

pub mod resource;
pub mod store;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{AllocError, AllocResult};
use crate::observability::metrics;
use crate::registry::resource::{
    HealthStatus, ProtocolType, Resource, ResourceId, ResourceKind, ResourceStatus, TenantId,
    MAX_LOAD,
};
use crate::registry::store::{ResourceQuery, ResourceStore, StoreError, MAX_CAS_ATTEMPTS};

/// Changes applied by [`ResourceRegistry::apply_inventory`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InventoryDiff {
    pub added: Vec<ResourceId>,
    pub updated: Vec<ResourceId>,
    pub removed: Vec<ResourceId>,
}

/// Authoritative store of resources with safe mutation primitives.
#[derive(Clone)]
pub struct ResourceRegistry {
    store: Arc<dyn ResourceStore>,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry").finish_non_exhaustive()
    }
}

impl ResourceRegistry {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Registry over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(store::MemoryStore::new()))
    }

    /// Add or replace a resource (admin action).
    pub fn register(&self, resource: Resource) {
        tracing::info!(
            resource = %resource.id,
            tenant = %resource.tenant_id,
            protocol = %resource.protocol,
            region = %resource.region,
            "Resource registered"
        );
        metrics::record_resource_load(&resource.id, resource.capacity_load);
        self.store.insert(resource);
    }

    /// Delete a resource (admin action).
    pub fn remove(&self, id: &ResourceId) -> AllocResult<Resource> {
        let removed = self
            .store
            .remove(id)
            .ok_or_else(|| AllocError::NotFound(id.clone()))?;
        tracing::info!(resource = %id, "Resource removed");
        Ok(removed)
    }

    pub fn get(&self, id: &ResourceId) -> AllocResult<Resource> {
        self.store.get(id).ok_or_else(|| AllocError::NotFound(id.clone()))
    }

    /// Every resource regardless of tenant or status.
    pub fn all(&self) -> Vec<Resource> {
        self.store.find_matching(&ResourceQuery::default())
    }

    /// Online resources of `tenant`, optionally filtered by protocol and region.
    pub fn list_eligible(
        &self,
        tenant: &TenantId,
        protocol: Option<ProtocolType>,
        region: Option<&str>,
    ) -> Vec<Resource> {
        self.list_eligible_filtered(tenant, protocol, region, None)
    }

    /// [`ResourceRegistry::list_eligible`] with an additional kind filter.
    pub fn list_eligible_filtered(
        &self,
        tenant: &TenantId,
        protocol: Option<ProtocolType>,
        region: Option<&str>,
        kind: Option<ResourceKind>,
    ) -> Vec<Resource> {
        let query = ResourceQuery {
            tenant_id: Some(tenant.clone()),
            protocol,
            region: region.map(str::to_string),
            kind,
            status: Some(ResourceStatus::Online),
        };
        self.store.find_matching(&query)
    }

    /// Atomically add `delta` to the load, clamped to `0..=100`.
    pub fn adjust_load(&self, id: &ResourceId, delta: i64) -> AllocResult<u8> {
        let updated = self
            .store
            .atomic_increment(id, delta, 0, MAX_LOAD)
            .map_err(into_alloc_error)?;
        tracing::debug!(resource = %id, delta, load = updated.capacity_load, "Load adjusted");
        metrics::record_resource_load(id, updated.capacity_load);
        Ok(updated.capacity_load)
    }

    /// Set the load to an absolute value (clamped). Idempotent.
    ///
    /// `connected_users` is set to the unclamped, non-negative count.
    pub fn set_load(&self, id: &ResourceId, value: i64) -> AllocResult<u8> {
        let updated = self.update_with(id, |r| {
            r.capacity_load = resource::clamp_load(value);
            r.connected_users = value.clamp(0, u32::MAX as i64) as u32;
        })?;
        tracing::debug!(resource = %id, load = updated.capacity_load, "Load set");
        metrics::record_resource_load(id, updated.capacity_load);
        Ok(updated.capacity_load)
    }

    /// Set the operational status. Returns the previous status.
    pub fn set_status(&self, id: &ResourceId, status: ResourceStatus) -> AllocResult<ResourceStatus> {
        let mut previous = status;
        self.update_with(id, |r| {
            previous = r.status;
            r.status = status;
        })?;
        if previous != status {
            tracing::info!(resource = %id, from = %previous, to = %status, "Status changed");
            metrics::record_status_transition(status);
        }
        Ok(previous)
    }

    /// Record a health verdict and stamp `last_health_check`.
    pub fn set_health(&self, id: &ResourceId, health: HealthStatus) -> AllocResult<HealthStatus> {
        let now = SystemTime::now();
        let mut previous = health;
        self.update_with(id, |r| {
            previous = r.health_status;
            r.health_status = health;
            r.last_health_check = Some(now);
        })?;
        metrics::record_resource_health(id, health == HealthStatus::Healthy);
        Ok(previous)
    }

    /// Upsert the declared inventory and drop resources not declared.
    ///
    /// Existing resources keep their load, status, health and counters; only
    /// declared fields are refreshed.
    pub fn apply_inventory(&self, declared: Vec<Resource>) -> InventoryDiff {
        let mut diff = InventoryDiff::default();
        let keep: HashSet<ResourceId> = declared.iter().map(|r| r.id.clone()).collect();

        for resource in declared {
            let id = resource.id.clone();
            match self.store.get(&id) {
                None => {
                    self.register(resource);
                    diff.added.push(id);
                }
                Some(existing) if declared_fields_differ(&existing, &resource) => {
                    let result = self.update_with(&id, |r| {
                        r.name = resource.name.clone();
                        r.kind = resource.kind;
                        r.protocol = resource.protocol;
                        r.region = resource.region.clone();
                        r.address = resource.address;
                        r.weight = resource.weight;
                        r.tenant_id = resource.tenant_id.clone();
                    });
                    match result {
                        Ok(_) => diff.updated.push(id),
                        Err(e) => tracing::warn!(resource = %id, error = %e, "Inventory update skipped"),
                    }
                }
                Some(_) => {}
            }
        }

        for existing in self.all() {
            if !keep.contains(&existing.id) && self.store.remove(&existing.id).is_some() {
                tracing::info!(resource = %existing.id, "Resource removed from inventory");
                diff.removed.push(existing.id);
            }
        }

        diff
    }

    /// Move the status from `from` to `to` only if it is still `from` when
    /// the write lands. Returns whether the transition happened.
    pub fn transition(&self, id: &ResourceId, from: ResourceStatus, to: ResourceStatus) -> AllocResult<bool> {
        let updated = self.update_if(id, |r| {
            if r.status != from {
                return false;
            }
            r.status = to;
            true
        })?;
        if updated.is_some() && from != to {
            tracing::info!(resource = %id, from = %from, to = %to, "Status changed");
            metrics::record_status_transition(to);
        }
        Ok(updated.is_some())
    }

    /// Read-modify-write through compare-and-set with bounded retries.
    fn update_with<F>(&self, id: &ResourceId, mut f: F) -> AllocResult<Resource>
    where
        F: FnMut(&mut Resource),
    {
        let stored = self.update_if(id, |r| {
            f(r);
            true
        })?;
        stored.ok_or_else(|| AllocError::NotFound(id.clone()))
    }

    /// Like `update_with`, but `f` may decline the write by returning `false`
    /// after seeing the current document, in which case `None` is returned.
    fn update_if<F>(&self, id: &ResourceId, mut f: F) -> AllocResult<Option<Resource>>
    where
        F: FnMut(&mut Resource) -> bool,
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.get(id)?;
            let mut next = current.clone();
            if !f(&mut next) {
                return Ok(None);
            }
            match self.store.compare_and_set(id, current.version, next) {
                Ok(stored) => return Ok(Some(stored)),
                Err(StoreError::VersionMismatch { .. }) => {
                    tracing::trace!(resource = %id, "CAS lost, retrying");
                }
                Err(e) => return Err(into_alloc_error(e)),
            }
        }
        Err(AllocError::ConcurrentUpdateConflict { id: id.clone(), attempts: MAX_CAS_ATTEMPTS })
    }
}

fn declared_fields_differ(existing: &Resource, declared: &Resource) -> bool {
    existing.name != declared.name
        || existing.kind != declared.kind
        || existing.protocol != declared.protocol
        || existing.region != declared.region
        || existing.address != declared.address
        || existing.weight != declared.weight
        || existing.tenant_id != declared.tenant_id
}

fn into_alloc_error(err: StoreError) -> AllocError {
    match err {
        StoreError::NotFound(id) => AllocError::NotFound(id),
        StoreError::VersionMismatch { id, .. } => {
            AllocError::ConcurrentUpdateConflict { id, attempts: 1 }
        }
        StoreError::Conflict { id, attempts } => AllocError::ConcurrentUpdateConflict { id, attempts },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    fn resource(id: &str, tenant: &str, protocol: ProtocolType, region: &str) -> Resource {
        Resource::new(id.into(), tenant.into(), protocol, region, "127.0.0.1:443".parse().unwrap())
    }

    fn registry() -> ResourceRegistry {
        let registry = ResourceRegistry::in_memory();
        registry.register(resource("a", "t1", ProtocolType::WireGuard, "de"));
        registry.register(resource("b", "t1", ProtocolType::OpenVpn, "de"));
        registry.register(resource("c", "t1", ProtocolType::WireGuard, "us"));
        registry.register(resource("d", "t2", ProtocolType::WireGuard, "de"));
        registry.register(
            resource("e", "t1", ProtocolType::WireGuard, "de").with_status(ResourceStatus::Maintenance),
        );
        registry.register(
            resource("f", "t1", ProtocolType::WireGuard, "de").with_status(ResourceStatus::Offline),
        );
        registry
    }

    fn ids(resources: Vec<Resource>) -> Vec<String> {
        resources.into_iter().map(|r| r.id.to_string()).collect()
    }

    #[test]
    fn test_list_eligible_scopes_tenant_and_status() {
        let registry = registry();
        let all = registry.list_eligible(&"t1".into(), None, None);
        assert_eq!(ids(all.clone()), vec!["a", "b", "c"]);
        assert!(all.iter().all(|r| r.is_online() && r.tenant_id.as_str() == "t1"));
    }

    #[test]
    fn test_list_eligible_filters_are_conjunctive() {
        let registry = registry();
        let wg_de = registry.list_eligible(&"t1".into(), Some(ProtocolType::WireGuard), Some("de"));
        assert_eq!(ids(wg_de), vec!["a"]);

        let none = registry.list_eligible(&"t1".into(), Some(ProtocolType::ZeroTier), None);
        assert!(none.is_empty());

        let unknown_tenant = registry.list_eligible(&"nobody".into(), None, None);
        assert!(unknown_tenant.is_empty());
    }

    #[test]
    fn test_adjust_load_clamps_and_reports_missing() {
        let registry = registry();
        let id = ResourceId::from("a");
        assert_eq!(registry.adjust_load(&id, 1).unwrap(), 1);
        assert_eq!(registry.adjust_load(&id, 1_000).unwrap(), 100);
        assert_eq!(registry.adjust_load(&id, -5).unwrap(), 95);
        assert_eq!(registry.adjust_load(&id, i64::MIN / 2).unwrap(), 0);
        assert_eq!(registry.adjust_load(&id, i64::MAX).unwrap(), 100);
        assert_eq!(registry.adjust_load(&id, i64::MIN).unwrap(), 0);

        assert_eq!(
            registry.adjust_load(&"gone".into(), 1),
            Err(AllocError::NotFound("gone".into()))
        );
    }

    #[test]
    fn test_set_load_is_idempotent() {
        let registry = registry();
        let id = ResourceId::from("a");
        registry.adjust_load(&id, 40).unwrap();
        assert_eq!(registry.set_load(&id, 12).unwrap(), 12);
        assert_eq!(registry.set_load(&id, 12).unwrap(), 12);
        let r = registry.get(&id).unwrap();
        assert_eq!(r.capacity_load, 12);
        assert_eq!(r.connected_users, 12);

        assert_eq!(registry.set_load(&id, 250).unwrap(), 100);
        assert_eq!(registry.get(&id).unwrap().connected_users, 250);
        assert_eq!(registry.set_load(&id, -3).unwrap(), 0);
    }

    #[test]
    fn test_status_and_health_are_independent() {
        let registry = registry();
        let id = ResourceId::from("a");

        registry.set_health(&id, HealthStatus::Healthy).unwrap();
        let previous = registry.set_status(&id, ResourceStatus::Maintenance).unwrap();
        assert_eq!(previous, ResourceStatus::Online);

        let r = registry.get(&id).unwrap();
        assert_eq!(r.health_status, HealthStatus::Healthy);
        assert_eq!(r.status, ResourceStatus::Maintenance);
        assert!(r.last_health_check.is_some());

        // Every transition is permitted.
        registry.set_status(&id, ResourceStatus::Offline).unwrap();
        registry.set_status(&id, ResourceStatus::Online).unwrap();
        assert!(registry.get(&id).unwrap().is_online());
    }

    #[test]
    fn test_transition_only_from_expected_status() {
        let registry = registry();
        let id = ResourceId::from("a");

        assert!(registry.transition(&id, ResourceStatus::Online, ResourceStatus::Maintenance).unwrap());
        assert_eq!(registry.get(&id).unwrap().status, ResourceStatus::Maintenance);

        registry.set_status(&id, ResourceStatus::Offline).unwrap();
        let version = registry.get(&id).unwrap().version;
        assert!(!registry.transition(&id, ResourceStatus::Maintenance, ResourceStatus::Online).unwrap());
        let r = registry.get(&id).unwrap();
        assert_eq!(r.status, ResourceStatus::Offline);
        assert_eq!(r.version, version);
    }

    /// Lands an admin `Offline` between the registry's read and its CAS.
    struct AdminOfflineRace {
        inner: MemoryStore,
        raced: AtomicBool,
    }

    impl ResourceStore for AdminOfflineRace {
        fn find_matching(&self, query: &ResourceQuery) -> Vec<Resource> {
            self.inner.find_matching(query)
        }
        fn get(&self, id: &ResourceId) -> Option<Resource> {
            self.inner.get(id)
        }
        fn insert(&self, resource: Resource) {
            self.inner.insert(resource)
        }
        fn remove(&self, id: &ResourceId) -> Option<Resource> {
            self.inner.remove(id)
        }
        fn compare_and_set(
            &self,
            id: &ResourceId,
            expected_version: u64,
            new_doc: Resource,
        ) -> Result<Resource, StoreError> {
            if !self.raced.swap(true, AtomicOrdering::SeqCst) {
                if let Some(current) = self.inner.get(id) {
                    self.inner.insert(current.with_status(ResourceStatus::Offline));
                }
            }
            self.inner.compare_and_set(id, expected_version, new_doc)
        }
    }

    #[test]
    fn test_transition_loses_to_concurrent_offline() {
        let store = AdminOfflineRace {
            inner: MemoryStore::new(),
            raced: AtomicBool::new(false),
        };
        let registry = ResourceRegistry::new(Arc::new(store));
        registry.register(resource("a", "t1", ProtocolType::WireGuard, "de"));
        let id = ResourceId::from("a");

        assert!(!registry.transition(&id, ResourceStatus::Online, ResourceStatus::Maintenance).unwrap());
        assert_eq!(registry.get(&id).unwrap().status, ResourceStatus::Offline);
    }

    #[test]
    fn test_remove_then_get_is_not_found() {
        let registry = registry();
        registry.remove(&"a".into()).unwrap();
        assert!(matches!(registry.get(&"a".into()), Err(AllocError::NotFound(_))));
        assert!(matches!(registry.remove(&"a".into()), Err(AllocError::NotFound(_))));
    }

    #[test]
    fn test_apply_inventory_keeps_dynamic_state() {
        let registry = registry();
        registry.adjust_load(&"a".into(), 30).unwrap();

        let declared = vec![
            resource("a", "t1", ProtocolType::WireGuard, "de").with_name("frankfurt-1"),
            resource("b", "t1", ProtocolType::OpenVpn, "de"),
            resource("z", "t1", ProtocolType::ZeroTier, "jp"),
        ];
        let diff = registry.apply_inventory(declared);

        assert_eq!(diff.added, vec![ResourceId::from("z")]);
        assert_eq!(diff.updated, vec![ResourceId::from("a")]);
        assert_eq!(diff.removed.len(), 4);

        let a = registry.get(&"a".into()).unwrap();
        assert_eq!(a.name, "frankfurt-1");
        assert_eq!(a.capacity_load, 30);
        assert!(registry.get(&"c".into()).is_err());
    }
}
