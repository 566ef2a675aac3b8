//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use vpn_allocator::registry::resource::{ProtocolType, Resource, ResourceKind};

/// Start a programmable mock health endpoint on an ephemeral port.
///
/// The handler receives the request path and returns status, body and an
/// artificial delay applied before responding.
pub async fn start_health_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String, Duration)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let request = String::from_utf8_lossy(&buf[..n]);
                        let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                        let (status, body, delay) = f(path).await;
                        tokio::time::sleep(delay).await;

                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A health endpoint that always answers `{"status":"ok"}`.
pub async fn start_healthy_backend() -> SocketAddr {
    start_health_backend(|_| async { (200, r#"{"status":"ok"}"#.to_string(), Duration::ZERO) }).await
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn server(id: &str, tenant: &str, protocol: ProtocolType, load: u8) -> Resource {
    Resource::new(id.into(), tenant.into(), protocol, "eu-west", "127.0.0.1:9".parse().unwrap()).with_load(load)
}

pub fn node(id: &str, tenant: &str, load: u8) -> Resource {
    server(id, tenant, ProtocolType::ZeroTier, load).with_kind(ResourceKind::Node)
}
