//! Engine configuration

use crate::retry::RetryPolicy;
use preplan_core::route::RouterConfig;
use std::time::Duration;

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently dispatched steps per wave
    pub max_concurrency: usize,
    /// Per tool/retrieval invocation attempt timeout
    pub step_timeout: Duration,
    /// Retry policy for transient external failures
    pub retry: RetryPolicy,
    /// Complexity-routing thresholds
    pub router: RouterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            step_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            router: RouterConfig::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }
}
