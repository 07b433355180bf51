//! Catch-up throttle — keeps the scan clear of the unconfirmed chain tip.
//!
//! After a window `[start, end)` has been applied, the cursor may move past
//! it only once the head has reached `end + lag`, where
//! `lag = window_size + confirmation_margin`. The window that follows then
//! ends at least `confirmation_margin` blocks behind the head.

use std::time::Duration;

use crate::config::ScannerConfig;
use crate::cursor::Window;

#[derive(Debug, Clone)]
pub struct CatchUpThrottle {
    lag: u64,
    poll_interval: Duration,
    catch_up_wait: Duration,
}

impl CatchUpThrottle {
    pub fn new(lag: u64, poll_interval: Duration, catch_up_wait: Duration) -> Self {
        Self {
            lag,
            poll_interval,
            catch_up_wait,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(
            config.lag(),
            config.poll_interval(),
            config.catch_up_wait(),
        )
    }

    /// Lowest head at which the cursor may advance past `window`.
    pub fn required_head(&self, window: Window) -> u64 {
        window.end.saturating_add(self.lag)
    }

    /// Returns `true` if `head` is far enough ahead to advance past `window`.
    pub fn is_ready(&self, window: Window, head: u64) -> bool {
        head >= self.required_head(window)
    }

    /// Fast tier: sleep before every head poll.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Slow tier: extra sleep when the head is not yet far enough ahead.
    pub fn catch_up_wait(&self) -> Duration {
        self.catch_up_wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::RangeCursor;

    #[test]
    fn advancing_past_fifty_needs_head_at_120() {
        let throttle = CatchUpThrottle::from_config(&ScannerConfig::default());
        let first = RangeCursor::new(0, 50).window();

        assert_eq!(throttle.required_head(first), 120);
        assert!(!throttle.is_ready(first, 65));
        assert!(!throttle.is_ready(first, 119));
        assert!(throttle.is_ready(first, 120));
    }

    #[test]
    fn advanced_window_ends_a_margin_behind_head() {
        let throttle = CatchUpThrottle::new(70, Duration::ZERO, Duration::ZERO);
        for head in 0..500u64 {
            let mut cursor = RangeCursor::new(0, 50);
            while throttle.is_ready(cursor.window(), head) {
                let next = cursor.advance();
                assert!(next.end + 20 <= head);
            }
        }
    }

    #[test]
    fn required_head_saturates() {
        let throttle = CatchUpThrottle::new(70, Duration::ZERO, Duration::ZERO);
        let window = Window { start: u64::MAX - 60, end: u64::MAX - 10 };
        assert_eq!(throttle.required_head(window), u64::MAX);
    }
}
