//! Metrics collection and exposition.
//!
//! # Metrics
//! - `allocator_picks_total` (counter): selections by outcome
//! - `allocator_resource_load` (gauge): capacity load per resource
//! - `allocator_resource_health` (gauge): 1=healthy, 0=unhealthy
//! - `allocator_probe_failures_total` (counter): failed probes by reason
//! - `allocator_status_transitions_total` (counter): status changes by target
//! - `allocator_reconciled_total` (counter): loads corrected by reconciliation
//! - `allocator_scaling_advice_total` (counter): advice by direction

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::registry::resource::{ResourceId, ResourceStatus};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_pick(outcome: &'static str) {
    counter!("allocator_picks_total", "outcome" => outcome).increment(1);
}

pub fn record_resource_load(id: &ResourceId, load: u8) {
    gauge!("allocator_resource_load", "resource" => id.to_string()).set(f64::from(load));
}

pub fn record_resource_health(id: &ResourceId, healthy: bool) {
    let value = if healthy { 1.0 } else { 0.0 };
    gauge!("allocator_resource_health", "resource" => id.to_string()).set(value);
}

pub fn record_probe_failure(reason: &'static str) {
    counter!("allocator_probe_failures_total", "reason" => reason).increment(1);
}

pub fn record_status_transition(to: ResourceStatus) {
    counter!("allocator_status_transitions_total", "to" => to.as_str()).increment(1);
}

pub fn record_reconciled(corrected: u64) {
    counter!("allocator_reconciled_total").increment(corrected);
}

pub fn record_scaling_advice(direction: &'static str) {
    counter!("allocator_scaling_advice_total", "direction" => direction).increment(1);
}
