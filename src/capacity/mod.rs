//! Capacity management subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectionCountSource (authoritative counts)
//!     → reconcile.rs (overwrite drifted load in the registry)
//!
//! ResourceRegistry (current loads)
//!     → scaling.rs (advise scale up / scale down, log + metric)
//! ```
//!
//! # Design Decisions
//! - Both loops are periodic and stop on the shared shutdown signal
//! - Scaling only advises; no provisioning calls are made

pub mod reconcile;
pub mod scaling;

pub use reconcile::{ConnectionCountSource, HttpCountSource, Reconciler, SourceError};
pub use scaling::{ScalingAdvice, ScalingAdvisor, ScalingDirection};
