//! Retry with exponential backoff and per-attempt timeouts.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, VrcError};

/// Policy for [`RetryPolicy::run`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    /// Hard limit for a single attempt; `None` waits indefinitely.
    pub attempt_timeout: Option<Duration>,
    /// Errors for which another attempt is made.
    pub retryable: fn(&VrcError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            attempt_timeout: None,
            retryable: VrcError::is_timeout,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or exhausts `max_attempts`. The last error is returned.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(VrcError::timeout(format!(
                        "{label} exceeded {}ms",
                        limit.as_millis()
                    ))),
                },
                None => operation().await,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && (self.retryable)(&err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
