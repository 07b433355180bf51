//! Doubling backoff with a ceiling.
//!
//! Used for the unbounded reconnect and log-fetch retries
//! (`max_retries = None`) and for the bounded persistence retry in the applier.

use std::time::Duration;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    /// Initial backoff delay.
    pub initial_backoff: Duration,
    /// Maximum backoff delay (caps the doubling).
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Retry forever, starting at `initial` and never waiting longer than `max`.
    pub fn unbounded(initial: Duration, max: Duration) -> Self {
        Self {
            max_retries: None,
            initial_backoff: initial,
            max_backoff: max.max(initial),
        }
    }

    /// Retry up to `max_retries` times, doubling from `initial`.
    pub fn bounded(max_retries: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_retries: Some(max_retries),
            initial_backoff: initial,
            max_backoff: max.max(initial),
        }
    }
}

/// Stateless retry policy. Computes the next delay from the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th retry (1-based).
    /// Returns `None` if `attempt` exceeds `max_retries`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        let exponent = attempt.saturating_sub(1).min(63);
        let base_ms = self
            .config
            .initial_backoff
            .as_millis()
            .saturating_mul(1u128 << exponent);
        let ms = base_ms.min(self.config.max_backoff.as_millis());
        Some(Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX)))
    }

    /// Returns `true` if any retries remain after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        match self.config.max_retries {
            Some(max) => attempt <= max,
            None => true,
        }
    }
}
