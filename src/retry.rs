// src/retry.rs
// Single retry combinator parameterized by error classification, replacing
// the per-function ad-hoc retry/backoff loops flagged in spec §9.

use crate::error::CoreError;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const STORAGE: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(2),
    };

    pub const EXTERNAL_MODEL: RetryPolicy = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(5),
    };

    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1 << attempt.min(16));
        scaled.min(self.max_delay)
    }
}

/// Runs `op` up to `policy.max_attempts` times, only retrying errors that
/// classify as retryable per [`CoreError::retryable`]. Non-retryable errors
/// return immediately.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, code = e.code(), "retrying after backoff");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
