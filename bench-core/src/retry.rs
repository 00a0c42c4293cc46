//! Transient-error classification and bounded reconnect backoff.
//!
//! Store drivers do not expose a stable error kind for "the node went away",
//! so transient failures are recognized by message substring. Everything
//! else is fatal for the worker that hit it.

use rand::Rng;
use std::time::Duration;

/// Message fragments that mark a connection-level, retryable failure.
const TRANSIENT_MARKERS: [&str; 2] = ["connection refused", "connection reset"];

/// Check whether an error message describes a transient connection failure.
///
/// Matching is case-insensitive: OS errors render as "Connection refused".
pub fn is_transient(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Bounded retry policy for reconnect-and-replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum reconnect attempts per logical operation.
    pub max_attempts: u32,
    /// Delay before the first reconnect.
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits between attempts (tests, local runs).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Check whether another attempt is allowed after `attempts` reconnects.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Calculate the delay before reconnect number `attempt` (1-based).
    ///
    /// Formula: min(max_delay, base_delay * 2^(attempt-1)) + random(0..=base_delay/2)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(16);
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let jitter_cap = (self.base_delay.as_millis() / 2) as u64;
        let jitter_ms = rand::thread_rng().gen_range(0..=jitter_cap);
        exponential + Duration::from_millis(jitter_ms)
    }
}
