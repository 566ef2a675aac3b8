//! VPN resource allocator library.
//!
//! Tracks VPN servers and nodes for many tenants, picks the least-loaded
//! eligible resource for a connecting client, and keeps status current
//! through periodic health probes.

// Core subsystems
pub mod config;
pub mod error;
pub mod registry;
pub mod selector;

// Background services
pub mod capacity;
pub mod health;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::AllocatorConfig;
pub use error::{AllocError, AllocResult};
pub use lifecycle::{Services, Shutdown};
pub use registry::ResourceRegistry;
pub use selector::{LoadGuard, PickConstraints, Selector};
