//! Retry policy for the delivery loop

use std::time::Duration;

use contracts::RetryConfig;

/// When to pause between attempts and when to stop retrying.
///
/// Without ceilings the loop retries until a host accepts the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures after which every further attempt is delayed
    pub backoff_after: u32,
    /// Fixed delay inserted before each attempt once backoff is active
    pub backoff: Duration,
    pub max_attempts: Option<u32>,
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Delay to wait before the next attempt, given the failures so far
    /// in the current delivery.
    pub fn delay_after(&self, failures: u32) -> Option<Duration> {
        (failures >= self.backoff_after && !self.backoff.is_zero()).then_some(self.backoff)
    }

    /// Whether a delivery that has made `attempts` attempts over `elapsed`
    /// must stop.
    pub fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.max_elapsed.is_some_and(|max| elapsed >= max)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.max_elapsed.is_none()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            backoff_after: config.backoff_after,
            backoff: config.backoff(),
            max_attempts: config.max_attempts,
            max_elapsed: config.max_elapsed(),
        }
    }
}
