//! Allocation error taxonomy.

use thiserror::Error;

use crate::registry::resource::{ResourceId, TenantId};

/// Errors surfaced to allocation callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The resource no longer exists (e.g. deleted concurrently).
    #[error("resource {0} not found")]
    NotFound(ResourceId),

    /// No eligible resource matched the constraints.
    #[error("no suitable resource available for tenant {tenant}")]
    NoSuitableResource { tenant: TenantId },

    /// Optimistic update kept losing the race.
    #[error("concurrent update conflict on {id} after {attempts} attempts")]
    ConcurrentUpdateConflict { id: ResourceId, attempts: u32 },
}

/// Result type for allocation operations.
pub type AllocResult<T> = Result<T, AllocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AllocError::NotFound("srv-1".into());
        assert_eq!(err.to_string(), "resource srv-1 not found");

        let err = AllocError::NoSuitableResource { tenant: "acme".into() };
        assert!(err.to_string().contains("acme"));

        let err = AllocError::ConcurrentUpdateConflict { id: "srv-1".into(), attempts: 3 };
        assert!(err.to_string().contains("3 attempts"));
    }
}
