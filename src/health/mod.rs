//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs)
//!     → every resource with status != Offline
//!     → probe.rs (HTTP GET per-protocol path, bounded timeout)
//!     → retry policy (resilience/retries.rs)
//!     → state.rs (consecutive failure counters)
//!     → registry.set_health / registry.set_status
//! ```
//!
//! # Design Decisions
//! - Health informs status but never forces Offline; Offline is admin only
//! - N consecutive failures to degrade, one success to recover
//! - Probe failures never reach allocation callers

pub mod active;
pub mod probe;
pub mod state;

pub use active::{HealthMonitor, RoundReport};
pub use probe::{HttpProber, ProbeError, Prober, SharedHealthConfig};
