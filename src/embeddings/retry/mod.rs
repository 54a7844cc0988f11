
use std::time::Duration;
use tracing::{debug, error, warn};

use super::EmbeddingError;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Retry schedule for connectivity failures: waits of 1, 2, 4, ... backoff units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Wait before the `retry`-th retry (1-based)
    #[inline]
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = EXPONENTIAL_BACKOFF_BASE.saturating_pow(retry.saturating_sub(1));
        self.backoff_unit
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
    }

    /// Run `operation`, sleeping the calling thread between attempts
    #[inline]
    pub fn run<T, F>(&self, operation: F) -> Result<T, EmbeddingError>
    where
        F: FnMut() -> Result<T, EmbeddingError>,
    {
        self.run_with_sleep(operation, std::thread::sleep)
    }

    /// Run `operation` with an injectable sleep.
    ///
    /// Only [`EmbeddingError::Connectivity`] is retried. Any other error is returned
    /// immediately, and once attempts run out the last connectivity error is returned.
    #[inline]
    pub fn run_with_sleep<T, F, S>(&self, mut operation: F, mut sleep: S) -> Result<T, EmbeddingError>
    where
        F: FnMut() -> Result<T, EmbeddingError>,
        S: FnMut(Duration),
    {
        let mut attempt = 1;

        loop {
            debug!("Embedding request attempt {}/{}", attempt, self.max_attempts);

            match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Request succeeded on attempt {}", attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_connectivity() && attempt < self.max_attempts => {
                    let delay = self.delay_before_retry(attempt);
                    warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, self.max_attempts, err, delay
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_connectivity() {
                        error!("All {} attempts failed: {}", self.max_attempts, err);
                    } else {
                        warn!("Non-retryable error: {}", err);
                    }
                    return Err(err);
                }
            }
        }
    }
}
