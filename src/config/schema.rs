//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the allocator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::registry::resource::{
    ProtocolType, Resource, ResourceId, ResourceKind, ResourceStatus, TenantId,
};

/// Root configuration for the allocator daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Declared resource inventory.
    pub resources: Vec<ResourceConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Selection strategy.
    pub selection: SelectionConfig,

    /// Load drift reconciliation.
    pub reconciliation: ReconcileConfig,

    /// Scaling advice thresholds.
    pub scaling: ScalingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl AllocatorConfig {
    /// Resources built from the declared inventory. Entries with an
    /// unparseable address are skipped.
    pub fn inventory(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .filter_map(|config| match config.to_resource() {
                Ok(resource) => Some(resource),
                Err(e) => {
                    tracing::warn!(resource = %config.id, address = %config.address, error = %e, "Invalid resource address");
                    None
                }
            })
            .collect()
    }
}

/// A VPN server or node declared in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Unique resource identifier.
    pub id: String,

    /// Display name (defaults to the id).
    #[serde(default)]
    pub name: Option<String>,

    /// Owning tenant.
    pub tenant: String,

    #[serde(default)]
    pub kind: ResourceKind,

    pub protocol: ProtocolType,

    /// Locality tag, e.g. "de-fra".
    pub region: String,

    /// Probe address (e.g., "10.0.0.5:8080").
    pub address: String,

    /// Relative capacity for weighted selection (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Initial status.
    #[serde(default)]
    pub status: ResourceStatus,
}

fn default_weight() -> u32 {
    1
}

impl ResourceConfig {
    pub fn to_resource(&self) -> Result<Resource, std::net::AddrParseError> {
        let address = self.address.parse()?;
        let resource = Resource::new(
            ResourceId::new(self.id.clone()),
            TenantId::new(self.tenant.clone()),
            self.protocol,
            self.region.clone(),
            address,
        )
        .with_name(self.name.clone().unwrap_or_else(|| self.id.clone()))
        .with_kind(self.kind)
        .with_weight(self.weight)
        .with_status(self.status);
        Ok(resource)
    }
}

/// Health endpoint path per protocol.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProbePaths {
    pub openvpn: String,
    pub ikev2: String,
    pub wireguard: String,
    pub zerotier: String,
    /// Used for every node, whatever its protocol.
    pub node: String,
}

impl Default for ProbePaths {
    fn default() -> Self {
        Self {
            openvpn: "/health".to_string(),
            ikev2: "/ikev2/health".to_string(),
            wireguard: "/wireguard/health".to_string(),
            zerotier: "/zerotier/health".to_string(),
            node: "/node/health".to_string(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Hard deadline for one probe in milliseconds.
    pub timeout_ms: u64,

    /// Responses slower than this count as failures.
    pub slow_threshold_ms: u64,

    /// Number of consecutive failed rounds before moving to maintenance.
    pub failure_threshold: u32,

    /// Probe attempts within one round for retryable failures.
    pub max_attempts_per_round: u32,

    /// Base delay for in-round backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for in-round backoff in milliseconds.
    pub retry_max_delay_ms: u64,

    pub paths: ProbePaths,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_ms: 2000,
            slow_threshold_ms: 2000,
            failure_threshold: 3,
            max_attempts_per_round: 1,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 1000,
            paths: ProbePaths::default(),
        }
    }
}

/// Which selection strategy the selector uses.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    LeastLoaded,
    Weighted,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SelectionConfig {
    pub strategy: StrategyKind,
}

/// Reconciliation of load drift against an authoritative connection count.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Enable the reconciliation sweep.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,

    /// URL returning `{"<resource id>": <connections>, ...}`.
    pub source_url: Option<String>,

    /// Deadline for fetching counts in milliseconds.
    pub source_timeout_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 300,
            source_url: None,
            source_timeout_ms: 2000,
        }
    }
}

/// Load thresholds for scaling advice.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub enabled: bool,

    /// Scan interval in seconds.
    pub interval_secs: u64,

    /// Advise scaling up when load is strictly above this.
    pub scale_up_above: u8,

    /// Advise scaling down when load is non-zero and strictly below this.
    pub scale_down_below: u8,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            scale_up_above: 80,
            scale_down_below: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
