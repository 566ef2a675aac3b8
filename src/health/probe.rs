//! Health probes.
//!
//! # Responsibilities
//! - Define the probe seam used by the monitor
//! - Probe a resource's HTTP health endpoint with a deadline
//! - Classify the outcome into healthy or a typed failure
//!
//! # Probe contract
//! `GET http://{address}{path}` must answer `200` with a JSON body
//! `{"status": "ok"}` within the slow threshold. Paths are per protocol,
//! nodes use their own path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::HealthCheckConfig;
use crate::registry::resource::{ProtocolType, Resource, ResourceKind};
use crate::resilience::timeouts::with_deadline;

/// Largest health response body read.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Health config shared between the monitor and its prober, swappable on reload.
pub type SharedHealthConfig = Arc<ArcSwap<HealthCheckConfig>>;

/// Why a probe did not count as healthy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    BadStatus(u16),

    #[error("response took {elapsed:?}, limit {limit:?}")]
    Slow { elapsed: Duration, limit: Duration },

    #[error("unexpected response content: {0}")]
    BadContent(String),

    #[error("invalid probe target: {0}")]
    InvalidTarget(String),
}

impl ProbeError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Transport(_) => "transport",
            ProbeError::BadStatus(_) => "bad_status",
            ProbeError::Slow { .. } => "slow",
            ProbeError::BadContent(_) => "bad_content",
            ProbeError::InvalidTarget(_) => "invalid_target",
        }
    }
}

/// Probes one resource. `Ok` carries the observed latency.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, Result<Duration, ProbeError>>;
}

#[derive(Deserialize)]
struct HealthBody {
    status: String,
}

/// Pick the health endpoint path for a resource.
pub fn probe_path<'a>(config: &'a HealthCheckConfig, resource: &Resource) -> &'a str {
    let paths = &config.paths;
    if resource.kind == ResourceKind::Node {
        return &paths.node;
    }
    match resource.protocol {
        ProtocolType::OpenVpn => &paths.openvpn,
        ProtocolType::Ikev2 => &paths.ikev2,
        ProtocolType::WireGuard => &paths.wireguard,
        ProtocolType::ZeroTier => &paths.zerotier,
    }
}

/// Classify a response: status first, then latency, then content.
pub fn classify_response(
    status: StatusCode,
    body: &[u8],
    elapsed: Duration,
    slow_threshold: Duration,
) -> Result<Duration, ProbeError> {
    if status != StatusCode::OK {
        return Err(ProbeError::BadStatus(status.as_u16()));
    }
    if elapsed > slow_threshold {
        return Err(ProbeError::Slow { elapsed, limit: slow_threshold });
    }
    match serde_json::from_slice::<HealthBody>(body) {
        Ok(parsed) if parsed.status == "ok" => Ok(elapsed),
        Ok(parsed) => Err(ProbeError::BadContent(format!("status={}", parsed.status))),
        Err(_) => Err(ProbeError::BadContent(String::from_utf8_lossy(body).chars().take(128).collect())),
    }
}

/// HTTP prober over a shared hyper client.
pub struct HttpProber {
    client: Client<HttpConnector, Body>,
    config: SharedHealthConfig,
}

impl HttpProber {
    pub fn new(config: SharedHealthConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, config }
    }

    async fn probe_http(&self, resource: &Resource) -> Result<Duration, ProbeError> {
        let config = self.config.load_full();
        let path = probe_path(&config, resource);

        let url = Url::parse(&format!("http://{}", resource.address))
            .and_then(|base| base.join(path))
            .map_err(|e| ProbeError::InvalidTarget(e.to_string()))?;

        let request = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("user-agent", "vpn-allocator-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::InvalidTarget(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let slow_threshold = Duration::from_millis(config.slow_threshold_ms);
        let started = Instant::now();

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| ProbeError::Transport(e.to_string()))?;
            let status = response.status();
            let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES)
                .await
                .map_err(|e| ProbeError::Transport(e.to_string()))?;
            Ok::<_, ProbeError>((status, body))
        };

        let (status, body) = with_deadline(timeout, exchange)
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        classify_response(status, &body, started.elapsed(), slow_threshold)
    }
}

impl Prober for HttpProber {
    fn probe<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, Result<Duration, ProbeError>> {
        Box::pin(self.probe_http(resource))
    }
}
