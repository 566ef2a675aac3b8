//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AllocatorConfig (validated, immutable)
//!     → inventory seeds the registry; sections go to their subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → daemon swaps health settings and applies the inventory diff
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::AllocatorConfig;
pub use schema::HealthCheckConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProbePaths;
pub use schema::ReconcileConfig;
pub use schema::ResourceConfig;
pub use schema::ScalingConfig;
pub use schema::SelectionConfig;
pub use schema::StrategyKind;
