//! Bounded retry with exponential backoff
//!
//! Two distinct retry disciplines share this module: the outer transient
//! layer (backoff with jitter, bounded by `max_retries`) and the nonce
//! retry loops (bounded by attempt count, no backoff). Both are plain
//! synchronous-looking loops; nothing is scheduled in the background.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::errors::Error;

/// Retry policy for network operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,

    /// Base delay in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 - 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            jitter_factor: 0.1,
        }
    }

    /// Policy for the nonce retry loops: bounded by attempt count only.
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_factor: 0.0,
        }
    }

    /// Delay before retry number `attempt` (0-indexed), or `None` once the
    /// attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        if self.base_delay_ms == 0 {
            return Some(Duration::ZERO);
        }

        // Binary exponential backoff, capped.
        let exp = (self.base_delay_ms as f64) * 2_f64.powi(attempt as i32);
        let capped = exp.min(self.max_delay_ms as f64);

        let jitter_range = capped * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        Some(Duration::from_millis((capped + jitter).max(0.0) as u64))
    }
}

/// Retries `operation` while `should_retry` approves the error and the
/// attempt budget lasts. Returns the last observed error on exhaustion.
pub async fn retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if !should_retry(&err) {
                    return Err(err);
                }
                match policy.delay_for(attempt) {
                    Some(delay) => {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            max_attempts = policy.max_attempts,
                            error = %err,
                            "retrying operation"
                        );
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                    }
                    None => return Err(err),
                }
            }
        }
    }
}

/// Retries transient errors only; the common outer wrapper for reads.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    retry(policy, operation_name, Error::is_transient, operation).await
}
