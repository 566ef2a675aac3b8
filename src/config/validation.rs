//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check inventory integrity (unique ids, parseable addresses)
//! - Validate value ranges (timeouts > 0, thresholds ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AllocatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AllocatorConfig;
use crate::registry::resource::MAX_LOAD;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate resource id '{0}'")]
    DuplicateResource(String),

    #[error("resource '{0}' has an empty {1}")]
    EmptyField(String, &'static str),

    #[error("resource '{id}' has invalid address '{address}'")]
    InvalidAddress { id: String, address: String },

    #[error("resource '{0}' must have weight > 0")]
    ZeroWeight(String),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("probe path for {0} must start with '/'")]
    InvalidProbePath(&'static str),

    #[error("scaling thresholds must satisfy scale_down_below < scale_up_above <= 100")]
    ScalingThresholds,

    #[error("reconciliation is enabled but no source_url is set")]
    MissingReconcileSource,

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AllocatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for resource in &config.resources {
        if resource.id.trim().is_empty() {
            errors.push(ValidationError::EmptyField(resource.id.clone(), "id"));
        } else if !seen.insert(resource.id.as_str()) {
            errors.push(ValidationError::DuplicateResource(resource.id.clone()));
        }
        if resource.tenant.trim().is_empty() {
            errors.push(ValidationError::EmptyField(resource.id.clone(), "tenant"));
        }
        if resource.region.trim().is_empty() {
            errors.push(ValidationError::EmptyField(resource.id.clone(), "region"));
        }
        if resource.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                id: resource.id.clone(),
                address: resource.address.clone(),
            });
        }
        if resource.weight == 0 {
            errors.push(ValidationError::ZeroWeight(resource.id.clone()));
        }
    }

    let health = &config.health_check;
    let positives: [(&'static str, u64); 5] = [
        ("health_check.interval_secs", health.interval_secs),
        ("health_check.timeout_ms", health.timeout_ms),
        ("health_check.slow_threshold_ms", health.slow_threshold_ms),
        ("health_check.failure_threshold", health.failure_threshold as u64),
        ("health_check.max_attempts_per_round", health.max_attempts_per_round as u64),
    ];
    for (name, value) in positives {
        if value == 0 {
            errors.push(ValidationError::NotPositive(name));
        }
    }

    let paths = &health.paths;
    for (name, path) in [
        ("openvpn", &paths.openvpn),
        ("ikev2", &paths.ikev2),
        ("wireguard", &paths.wireguard),
        ("zerotier", &paths.zerotier),
        ("node", &paths.node),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidProbePath(name));
        }
    }

    let scaling = &config.scaling;
    if scaling.scale_down_below >= scaling.scale_up_above || scaling.scale_up_above > MAX_LOAD {
        errors.push(ValidationError::ScalingThresholds);
    }
    if scaling.enabled && scaling.interval_secs == 0 {
        errors.push(ValidationError::NotPositive("scaling.interval_secs"));
    }

    let reconcile = &config.reconciliation;
    if reconcile.enabled {
        if reconcile.source_url.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::MissingReconcileSource);
        }
        if reconcile.interval_secs == 0 {
            errors.push(ValidationError::NotPositive("reconciliation.interval_secs"));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ResourceConfig;
    use crate::registry::resource::{ProtocolType, ResourceKind, ResourceStatus};

    fn resource(id: &str, address: &str) -> ResourceConfig {
        ResourceConfig {
            id: id.into(),
            name: None,
            tenant: "t".into(),
            kind: ResourceKind::Server,
            protocol: ProtocolType::OpenVpn,
            region: "us".into(),
            address: address.into(),
            weight: 1,
            status: ResourceStatus::Online,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AllocatorConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AllocatorConfig::default();
        config.resources.push(resource("a", "127.0.0.1:80"));
        config.resources.push(resource("a", "nope"));
        config.health_check.timeout_ms = 0;
        config.health_check.paths.node = "node/health".into();
        config.scaling.scale_down_below = 90;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateResource("a".into())));
        assert!(errors.contains(&ValidationError::InvalidAddress {
            id: "a".into(),
            address: "nope".into()
        }));
        assert!(errors.contains(&ValidationError::NotPositive("health_check.timeout_ms")));
        assert!(errors.contains(&ValidationError::InvalidProbePath("node")));
        assert!(errors.contains(&ValidationError::ScalingThresholds));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_reconcile_needs_source() {
        let mut config = AllocatorConfig::default();
        config.reconciliation.enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::MissingReconcileSource])
        );
    }
}
