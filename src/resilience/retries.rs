//! Bounded retry policy for health probes.
//!
//! # Responsibilities
//! - Decide when consecutive probe failures degrade a resource
//! - Decide whether a failed probe is re-tried within the same round
//! - Space in-round attempts with jittered backoff

use std::time::Duration;

use crate::config::HealthCheckConfig;
use crate::health::probe::ProbeError;
use crate::resilience::backoff::Backoff;

/// Explicit retry policy owned by the health monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failed rounds before the resource is degraded.
    pub failure_threshold: u32,
    /// Probe attempts per round; retryable failures use the extra attempts.
    pub max_attempts_per_round: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            max_attempts_per_round: 1,
            backoff: Backoff::new(Duration::from_millis(100), Duration::from_secs(1)),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HealthCheckConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            max_attempts_per_round: config.max_attempts_per_round.max(1),
            backoff: Backoff::new(
                Duration::from_millis(config.retry_base_delay_ms),
                Duration::from_millis(config.retry_max_delay_ms),
            ),
        }
    }

    /// Transient failures may clear on a second look; a wrong answer will not.
    pub fn is_retryable(&self, error: &ProbeError) -> bool {
        matches!(
            error,
            ProbeError::Timeout(_) | ProbeError::Transport(_) | ProbeError::Slow { .. }
        )
    }

    /// Whether another attempt is allowed after `attempt` attempts failed with `error`.
    pub fn should_retry(&self, attempt: u32, error: &ProbeError) -> bool {
        attempt < self.max_attempts_per_round && self.is_retryable(error)
    }

    /// Whether `consecutive_failures` has exhausted the budget.
    pub fn is_exhausted(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.failure_threshold
    }
}
