//! Timeout enforcement for external calls.

use std::future::Future;
use std::time::Duration;

/// Marker error for an elapsed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {0:?} elapsed")]
pub struct Elapsed(pub Duration);

/// Run `fut` with a hard deadline.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut).await.map_err(|_| Elapsed(deadline))
}
