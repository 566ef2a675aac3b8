//! Persistence seam for resources.
//!
//! # Responsibilities
//! - Query resources by tenant, protocol, region, kind and status
//! - Atomic clamped increment of the load counter
//! - Optimistic compare-and-set for everything else
//!
//! # Design Decisions
//! - Every write bumps `version`
//! - `MemoryStore` locks one map shard per write, never the whole map
//! - Stores without a native increment inherit a bounded CAS loop

use dashmap::DashMap;
use thiserror::Error;

use crate::registry::resource::{
    ProtocolType, Resource, ResourceId, ResourceKind, ResourceStatus, TenantId,
};

/// Attempts made by optimistic update loops before giving up.
pub const MAX_CAS_ATTEMPTS: u32 = 3;

/// Errors raised by a [`ResourceStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("resource {0} not found")]
    NotFound(ResourceId),

    #[error("version mismatch on {id}: expected {expected}, found {actual}")]
    VersionMismatch { id: ResourceId, expected: u64, actual: u64 },

    #[error("update on {id} conflicted {attempts} times")]
    Conflict { id: ResourceId, attempts: u32 },
}

/// Conjunctive filter; `None` means no constraint on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    pub tenant_id: Option<TenantId>,
    pub protocol: Option<ProtocolType>,
    pub region: Option<String>,
    pub kind: Option<ResourceKind>,
    pub status: Option<ResourceStatus>,
}

impl ResourceQuery {
    pub fn matches(&self, resource: &Resource) -> bool {
        self.tenant_id.as_ref().map_or(true, |t| &resource.tenant_id == t)
            && self.protocol.map_or(true, |p| resource.protocol == p)
            && self.region.as_ref().map_or(true, |r| &resource.region == r)
            && self.kind.map_or(true, |k| resource.kind == k)
            && self.status.map_or(true, |s| resource.status == s)
    }
}

/// Backing storage for the registry.
pub trait ResourceStore: Send + Sync {
    /// Snapshot of every resource matching `query`, in id order.
    fn find_matching(&self, query: &ResourceQuery) -> Vec<Resource>;

    fn get(&self, id: &ResourceId) -> Option<Resource>;

    /// Insert or fully replace a resource.
    fn insert(&self, resource: Resource);

    fn remove(&self, id: &ResourceId) -> Option<Resource>;

    /// Replace the stored document only if its version still equals
    /// `expected_version`. Returns the stored document on success.
    fn compare_and_set(
        &self,
        id: &ResourceId,
        expected_version: u64,
        new_doc: Resource,
    ) -> Result<Resource, StoreError>;

    /// Add `delta` to the load, clamped to `[min, max]`.
    fn atomic_increment(
        &self,
        id: &ResourceId,
        delta: i64,
        min: u8,
        max: u8,
    ) -> Result<Resource, StoreError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let current = self.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let mut next = current.clone();
            next.apply_load_delta_within(delta, min, max);
            match self.compare_and_set(id, current.version, next) {
                Ok(stored) => return Ok(stored),
                Err(StoreError::VersionMismatch { .. }) if attempts < MAX_CAS_ATTEMPTS => continue,
                Err(StoreError::VersionMismatch { .. }) => {
                    return Err(StoreError::Conflict { id: id.clone(), attempts });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// In-process store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: DashMap<ResourceId, Resource>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl ResourceStore for MemoryStore {
    fn find_matching(&self, query: &ResourceQuery) -> Vec<Resource> {
        let mut found: Vec<Resource> = self
            .inner
            .iter()
            .filter(|r| query.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    fn get(&self, id: &ResourceId) -> Option<Resource> {
        self.inner.get(id).map(|r| r.value().clone())
    }

    fn insert(&self, mut resource: Resource) {
        if let Some(existing) = self.inner.get(&resource.id) {
            resource.version = existing.version + 1;
        }
        self.inner.insert(resource.id.clone(), resource);
    }

    fn remove(&self, id: &ResourceId) -> Option<Resource> {
        self.inner.remove(id).map(|(_, r)| r)
    }

    fn compare_and_set(
        &self,
        id: &ResourceId,
        expected_version: u64,
        mut new_doc: Resource,
    ) -> Result<Resource, StoreError> {
        let mut entry = self
            .inner
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if entry.version != expected_version {
            return Err(StoreError::VersionMismatch {
                id: id.clone(),
                expected: expected_version,
                actual: entry.version,
            });
        }
        new_doc.id = id.clone();
        new_doc.version = expected_version + 1;
        *entry = new_doc;
        Ok(entry.clone())
    }

    fn atomic_increment(
        &self,
        id: &ResourceId,
        delta: i64,
        min: u8,
        max: u8,
    ) -> Result<Resource, StoreError> {
        // The entry guard holds the shard write lock for the whole read-modify-write.
        let mut entry = self
            .inner
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        entry.apply_load_delta_within(delta, min, max);
        entry.version += 1;
        Ok(entry.clone())
    }
}
