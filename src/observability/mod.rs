//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! registry / selector / health / capacity produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - Labels are bounded: resource ids, outcome and reason names

pub mod logging;
pub mod metrics;
