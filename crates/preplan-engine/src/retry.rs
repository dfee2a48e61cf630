//! Retry policy for external invocations
//!
//! Transient tool/retrieval failures are retried with exponential backoff
//! up to a configured bound; permanent failures propagate immediately. A
//! per-attempt timeout counts as one transient attempt, so exhausted
//! retries surface a timeout as the step's permanent failure.

use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (1 disables retries)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Backoff multiplier per further attempt
    pub multiplier: f64,
    /// Ceiling on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after attempt number `attempt` (1-based) fails.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.base_delay.mul_f64(factor.max(0.0));
        delay.min(self.max_delay)
    }
}

/// Run `op` under the policy, retrying while failures classify as
/// transient. Returns the final outcome plus the number of attempts taken.
pub(crate) async fn retry_transient<T, E, F, Fut>(
    policy: &RetryPolicy,
    attempt_timeout: Duration,
    is_transient: impl Fn(&E) -> bool,
    timeout_error: impl Fn(Duration) -> E,
    mut op: F,
) -> (Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let outcome = match tokio::time::timeout(attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(attempt_timeout)),
        };
        match outcome {
            Ok(value) => return (Ok(value), attempts),
            Err(error) if is_transient(&error) && attempts < policy.max_attempts => {
                let delay = policy.delay_for(attempts);
                tracing::debug!(attempt = attempts, ?delay, "transient failure, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(error) => return (Err(error), attempts),
        }
    }
}
