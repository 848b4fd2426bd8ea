use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use common::constant::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS};
use connector::RestError;
use tokio::time::sleep;
use tracing::warn;

/// Bounded retry with exponential backoff, shared by every I/O step of a sync run.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub async fn run<T, F, Fut>(&self, label: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_transient(&err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        op = label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %format!("{err:#}"),
                        "retrying after failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err.context(format!("{label} failed after {attempt} attempt(s)")));
                }
            }
        }
    }
}

/// Client-side upstream errors are final; everything else gets another attempt.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<RestError>())
        .map(RestError::is_transient)
        .unwrap_or(true)
}
