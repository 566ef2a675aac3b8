//! Load drift reconciliation.
//!
//! Guards that leak (crashed callers, lost releases) leave the registry's
//! load higher than reality. The reconciler periodically overwrites each
//! known resource's load with an authoritative connection count.

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;
use crate::registry::resource::ResourceId;
use crate::registry::ResourceRegistry;
use crate::resilience::timeouts::with_deadline;

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("connection count source timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection count source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed connection counts: {0}")]
    Malformed(String),
}

/// Authoritative live connection counts keyed by resource id.
pub trait ConnectionCountSource: Send + Sync {
    fn counts(&self) -> BoxFuture<'_, Result<HashMap<ResourceId, u32>, SourceError>>;
}

/// Reads counts from an HTTP endpoint answering
/// `{"<resource id>": <connections>, ...}`.
pub struct HttpCountSource {
    client: Client<HttpConnector, Body>,
    url: String,
    timeout: Duration,
}

impl HttpCountSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    async fn fetch(&self) -> Result<HashMap<ResourceId, u32>, SourceError> {
        let request = Request::builder()
            .method("GET")
            .uri(self.url.as_str())
            .header("accept", "application/json")
            .body(Body::empty())
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| SourceError::Unavailable(e.to_string()))?;
            if response.status() != StatusCode::OK {
                return Err(SourceError::Unavailable(format!("status {}", response.status())));
            }
            axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES)
                .await
                .map_err(|e| SourceError::Unavailable(e.to_string()))
        };

        let body = with_deadline(self.timeout, exchange)
            .await
            .map_err(|_| SourceError::Timeout(self.timeout))??;

        serde_json::from_slice(&body).map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

impl ConnectionCountSource for HttpCountSource {
    fn counts(&self) -> BoxFuture<'_, Result<HashMap<ResourceId, u32>, SourceError>> {
        Box::pin(self.fetch())
    }
}

pub struct Reconciler {
    registry: ResourceRegistry,
    source: Box<dyn ConnectionCountSource>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(registry: ResourceRegistry, source: Box<dyn ConnectionCountSource>, interval: Duration) -> Self {
        Self {
            registry,
            source,
            interval,
        }
    }

    /// One sweep. Returns how many resources had their load corrected.
    ///
    /// Resources the source does not report are left untouched.
    pub async fn run_once(&self) -> Result<usize, SourceError> {
        let counts = self.source.counts().await?;
        let mut corrected = 0;

        for resource in self.registry.all() {
            let Some(&count) = counts.get(&resource.id) else {
                continue;
            };
            let before = resource.capacity_load;
            match self.registry.set_load(&resource.id, i64::from(count)) {
                Ok(after) if after != before => {
                    tracing::info!(resource = %resource.id, before, after, connections = count, "Load drift corrected");
                    corrected += 1;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(resource = %resource.id, error = %e, "Failed to reconcile load"),
            }
        }

        metrics::record_reconciled(corrected as u64);
        Ok(corrected)
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Reconciler starting");
        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::warn!(error = %e, "Reconciliation sweep skipped");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reconciler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::resource::{ProtocolType, Resource};

    struct FixedSource(Result<HashMap<ResourceId, u32>, SourceError>);

    impl ConnectionCountSource for FixedSource {
        fn counts(&self) -> BoxFuture<'_, Result<HashMap<ResourceId, u32>, SourceError>> {
            Box::pin(async move { self.0.clone() })
        }
    }

    fn registry() -> ResourceRegistry {
        let registry = ResourceRegistry::in_memory();
        for (id, load) in [("a", 40), ("b", 5), ("c", 70)] {
            registry.register(
                Resource::new(id.into(), "t".into(), ProtocolType::OpenVpn, "eu", "127.0.0.1:1".parse().unwrap())
                    .with_load(load),
            );
        }
        registry
    }

    #[tokio::test]
    async fn test_sweep_overwrites_reported_loads() {
        let registry = registry();
        let counts = HashMap::from([("a".into(), 12), ("b".into(), 5), ("c".into(), 250)]);
        let reconciler = Reconciler::new(registry.clone(), Box::new(FixedSource(Ok(counts))), Duration::from_secs(60));

        assert_eq!(reconciler.run_once().await, Ok(2));
        assert_eq!(registry.get(&"a".into()).unwrap().capacity_load, 12);
        assert_eq!(registry.get(&"b".into()).unwrap().capacity_load, 5);

        let c = registry.get(&"c".into()).unwrap();
        assert_eq!(c.capacity_load, 100);
        assert_eq!(c.connected_users, 250);
    }

    #[tokio::test]
    async fn test_unreported_resources_untouched() {
        let registry = registry();
        let counts = HashMap::from([("a".into(), 0)]);
        let reconciler = Reconciler::new(registry.clone(), Box::new(FixedSource(Ok(counts))), Duration::from_secs(60));

        assert_eq!(reconciler.run_once().await, Ok(1));
        assert_eq!(registry.get(&"a".into()).unwrap().capacity_load, 0);
        assert_eq!(registry.get(&"c".into()).unwrap().capacity_load, 70);
    }

    #[tokio::test]
    async fn test_source_failure_changes_nothing() {
        let registry = registry();
        let source = FixedSource(Err(SourceError::Timeout(Duration::from_secs(2))));
        let reconciler = Reconciler::new(registry.clone(), Box::new(source), Duration::from_secs(60));

        assert!(matches!(reconciler.run_once().await, Err(SourceError::Timeout(_))));
        assert_eq!(registry.get(&"a".into()).unwrap().capacity_load, 40);
    }
}
