//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! External call (health probe, connection-count source):
//!     → timeouts.rs (every call has a deadline)
//!     → On failure: retries.rs (classify, retry in round with backoff.rs)
//!     → Exhausted budget: caller degrades the resource
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retry budgets are explicit policy objects, not ad-hoc loops
//! - Jittered backoff prevents synchronized re-probing

pub mod backoff;
pub mod retries;
pub mod timeouts;
