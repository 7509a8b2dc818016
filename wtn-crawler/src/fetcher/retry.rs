//! Retry policy for upstream catalog requests
//!
//! Exponential backoff with a cap and optional jitter. The policy is a plain
//! value handed to the [`Fetcher`](super::Fetcher) so it can be tuned from
//! config and tested on its own.
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If the error is transient and attempts remain: log WARN, back off, retry
//! 4. Otherwise return the error (last one seen)

use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use wtn_common::config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1)
    pub max_attempts: u32,
    /// Sleep after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single sleep
    pub max_backoff: Duration,
    /// Add up to 25% random extra delay per sleep
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Policy with no sleeps, for tests and one-shot tooling
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    /// Backoff before retry number `attempt` (1 = after the first failure),
    /// without jitter: `initial * 2^(attempt-1)`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    fn sleep_duration(&self, attempt: u32) -> Duration {
        let base = self.backoff_for(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let extra_ms = rand::thread_rng().gen_range(0..=(base.as_millis() as u64 / 4));
        base + Duration::from_millis(extra_ms)
    }

    /// Run `operation` under this policy
    ///
    /// # Arguments
    /// * `operation_name` - Name for logging (usually the request URL)
    /// * `operation` - Closure producing a fresh request future per attempt
    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !err.is_transient() {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "Non-transient failure, not retrying"
                        );
                        return Err(err);
                    }

                    if attempt >= self.max_attempts {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "Request failed: retries exhausted"
                        );
                        return Err(err);
                    }

                    let backoff = self.sleep_duration(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Transient failure, will retry after backoff"
                    );

                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
