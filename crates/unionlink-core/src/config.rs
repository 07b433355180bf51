//! Scanner configuration.

use std::time::Duration;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::backoff::RetryConfig;
use crate::error::ScanError;

/// First block of the UnionWallet deployment.
pub const DEFAULT_START_BLOCK: u64 = 29_367_000;

/// Configuration for a scanner instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Contract whose `Link` / `UnLink` logs are mirrored.
    pub contract: Address,
    /// First block of the first window (unless a checkpoint is further ahead).
    pub start_block: u64,
    /// Blocks per `eth_getLogs` window.
    pub window_size: u64,
    /// Blocks a window's end must stay behind the head.
    /// The catch-up lag is `window_size + confirmation_margin`.
    pub confirmation_margin: u64,
    /// Sleep before every head poll (milliseconds).
    pub poll_interval_ms: u64,
    /// Extra sleep when the head is not far enough ahead (milliseconds).
    pub catch_up_wait_ms: u64,
    /// First reconnect backoff (milliseconds).
    pub reconnect_backoff_ms: u64,
    /// Reconnect backoff ceiling (milliseconds).
    pub reconnect_backoff_max_ms: u64,
    /// Persistence retries for a transient store failure.
    pub store_max_retries: u32,
    /// First persistence retry backoff (milliseconds).
    pub store_backoff_ms: u64,
    /// Pause before the supervisor restarts a failed run (milliseconds).
    pub restart_pause_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            contract: Address::ZERO,
            start_block: DEFAULT_START_BLOCK,
            window_size: 50,
            confirmation_margin: 20,
            poll_interval_ms: 5_000,
            catch_up_wait_ms: 120_000,
            reconnect_backoff_ms: 30_000,
            reconnect_backoff_max_ms: 300_000,
            store_max_retries: 5,
            store_backoff_ms: 500,
            restart_pause_ms: 10_000,
        }
    }
}

impl ScannerConfig {
    /// Blocks the head must be ahead of the current window's end before the
    /// cursor advances.
    pub fn lag(&self) -> u64 {
        self.window_size.saturating_add(self.confirmation_margin)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn catch_up_wait(&self) -> Duration {
        Duration::from_millis(self.catch_up_wait_ms)
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }

    pub fn reconnect_retry(&self) -> RetryConfig {
        RetryConfig::unbounded(
            Duration::from_millis(self.reconnect_backoff_ms),
            Duration::from_millis(self.reconnect_backoff_max_ms),
        )
    }

    /// Delay between `eth_getLogs` retries, doubling from the poll interval
    /// up to the reconnect ceiling.
    pub fn fetch_retry(&self) -> RetryConfig {
        RetryConfig::unbounded(
            self.poll_interval(),
            Duration::from_millis(self.reconnect_backoff_max_ms),
        )
    }

    pub fn store_retry(&self) -> RetryConfig {
        RetryConfig::bounded(
            self.store_max_retries,
            Duration::from_millis(self.store_backoff_ms),
            Duration::from_millis(self.store_backoff_ms.saturating_mul(32)),
        )
    }

    /// Reject configurations the scanner cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.window_size == 0 {
            return Err(ScanError::Config("window_size must be at least 1".into()));
        }
        if self.contract == Address::ZERO {
            return Err(ScanError::Config("contract address is not set".into()));
        }
        let first_gate = self
            .window_size
            .checked_add(self.confirmation_margin)
            .and_then(|lag| self.start_block.checked_add(self.window_size)?.checked_add(lag));
        if first_gate.is_none() {
            return Err(ScanError::Config(format!(
                "start_block {} leaves no room for a window of {} plus a lag of {}",
                self.start_block,
                self.window_size,
                self.lag()
            )));
        }
        Ok(())
    }
}
