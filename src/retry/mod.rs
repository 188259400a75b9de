//! Retry policy shared by every service call.
//!
//! A [`RetryPolicy`] bounds each attempt with a timeout and retries transient failures with
//! exponential backoff and jitter. Errors opt in through [`Retryable`].


use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_JITTER,
    DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
};
use crate::hashing::unit_interval;

/// Errors the retry policy knows how to classify.
pub trait Retryable: std::error::Error {
    /// `true` for failures worth retrying (timeouts, refused connections, 5xx).
    fn is_transient(&self) -> bool;

    /// Error to report when an attempt exceeded the call timeout.
    fn timed_out(operation: &str, after: Duration) -> Self;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay (before jitter).
    pub max_delay: Duration,
    /// Relative jitter in `[0, 1]`; `0.2` spreads delays over ±20%.
    pub jitter: f64,
    /// Timeout applied to every attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            jitter: DEFAULT_RETRY_JITTER,
            call_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn no_retry(call_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
            call_timeout,
        }
    }

    /// Fast policy for tests: tiny delays, no jitter.
    #[cfg(any(test, feature = "mock"))]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
            call_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Backoff before attempt `attempt + 1`, given that `attempt` (1-based) just failed.
    ///
    /// `seed` drives the jitter; equal seeds give equal delays.
    pub fn delay_for(&self, attempt: u32, seed: u64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self.base_delay.saturating_mul(1u32 << exponent);
        let capped = raw.min(self.max_delay);

        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || capped.is_zero() {
            return capped;
        }

        // Scale into [1 - jitter, 1 + jitter].
        let factor = 1.0 - jitter + 2.0 * jitter * unit_interval(seed);
        capped.mul_f64(factor)
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempts are used up.
    ///
    /// The returned error is the last one observed; a transient error here means the retry
    /// budget was exhausted.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let seed_base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let result = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(operation, self.call_timeout)),
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                debug!(operation, attempt, error = %err, "Permanent failure, not retrying");
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!(
                    operation,
                    attempts = attempt,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(err);
            }

            let delay = self.delay_for(attempt, seed_base.wrapping_add(attempt as u64));
            debug!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
