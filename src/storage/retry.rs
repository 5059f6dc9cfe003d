//! Retry logic for throttled S3 requests.
//!
//! Only the store's "slow down" signal is retried, with exponential backoff.
//! The policy wraps single requests; composite operations (listing, bucket
//! cleanup) inherit it through the requests they issue.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::config::RetryConfig;
use crate::error::Result;

/// Exponential backoff policy for throttled requests.
///
/// Stateless across calls: every [`RetryPolicy::run`] starts with the full
/// attempt budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_delay(),
            backoff_multiplier: clamp_multiplier(config.backoff_multiplier),
        }
    }
}

/// Backoff never shrinks; NaN, infinite and sub-1.0 multipliers become 1.0
fn clamp_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier >= 1.0 {
        multiplier
    } else {
        1.0
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = clamp_multiplier(backoff_multiplier);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after the given zero-based throttled attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 0..attempt {
            delay = self.grow(delay);
        }
        delay
    }

    fn grow(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Execute a request, replaying it while the store throttles us.
    ///
    /// Non-throttling errors are returned immediately. Once a single attempt
    /// remains, its outcome is returned unmodified whatever it is.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut remaining = self.max_attempts;
        let mut delay = self.initial_delay;

        while remaining > 1 {
            match request().await {
                Err(e) if e.is_throttling() => {
                    debug!(
                        operation = operation,
                        attempt = self.max_attempts - remaining + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Request throttled, backing off"
                    );
                    sleep(delay).await;
                    delay = self.grow(delay);
                    remaining -= 1;
                }
                other => return other,
            }
        }

        request().await
    }
}
