//! Load accounting guard.

use std::ops::Deref;

use uuid::Uuid;

use crate::error::AllocResult;
use crate::registry::resource::Resource;
use crate::registry::ResourceRegistry;

/// A RAII guard that owns one unit of load on an allocated resource.
///
/// The `-1` is applied exactly once, by [`LoadGuard::release`] or on drop.
/// Each guard carries a lease id so acquire and release can be matched in logs.
#[derive(Debug)]
pub struct LoadGuard {
    registry: ResourceRegistry,
    resource: Resource,
    lease_id: Uuid,
    armed: bool,
}

impl LoadGuard {
    pub(crate) fn new(registry: ResourceRegistry, resource: Resource) -> Self {
        let lease_id = Uuid::new_v4();
        tracing::debug!(lease = %lease_id, resource = %resource.id, load = resource.capacity_load, "Load leased");
        Self { registry, resource, lease_id, armed: true }
    }

    pub fn lease_id(&self) -> Uuid {
        self.lease_id
    }

    /// Give the load back now. Returns the resulting load.
    pub fn release(mut self) -> AllocResult<u8> {
        self.armed = false;
        let load = self.registry.adjust_load(&self.resource.id, -1)?;
        tracing::debug!(lease = %self.lease_id, resource = %self.resource.id, load, "Load released");
        Ok(load)
    }

    /// Keep the load and hand pairing over to the caller, who must later
    /// call `adjust_load(id, -1)` on disconnect.
    pub fn detach(mut self) -> Resource {
        self.armed = false;
        tracing::debug!(lease = %self.lease_id, resource = %self.resource.id, "Load lease detached");
        self.resource.clone()
    }
}

impl Deref for LoadGuard {
    type Target = Resource;
    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.registry.adjust_load(&self.resource.id, -1) {
            tracing::warn!(lease = %self.lease_id, resource = %self.resource.id, error = %e, "Failed to release load");
        }
    }
}
