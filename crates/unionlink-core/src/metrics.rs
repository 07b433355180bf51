//! Scanner counters, shared between the scanning task and the read API.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::cursor::Window;

/// Point-in-time copy of [`ScannerMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub window_start: u64,
    pub window_end: u64,
    pub last_head: u64,
    pub endpoint_ordinal: u64,
    pub windows_applied: u64,
    pub links_inserted: u64,
    pub links_duplicate: u64,
    pub unlinks_applied: u64,
    pub records_removed: u64,
    pub decode_errors: u64,
    pub persistence_retries: u64,
    pub persistence_conflicts: u64,
    pub dial_attempts: u64,
    pub dial_failures: u64,
    pub fetch_failures: u64,
    pub head_polls: u64,
    pub consecutive_connectivity_failures: u64,
    pub restarts: u64,
}

/// Lock-free scanner counters.
#[derive(Debug, Default)]
pub struct ScannerMetrics {
    window_start: AtomicU64,
    window_end: AtomicU64,
    last_head: AtomicU64,
    endpoint_ordinal: AtomicU64,
    windows_applied: AtomicU64,
    links_inserted: AtomicU64,
    links_duplicate: AtomicU64,
    unlinks_applied: AtomicU64,
    records_removed: AtomicU64,
    decode_errors: AtomicU64,
    persistence_retries: AtomicU64,
    persistence_conflicts: AtomicU64,
    dial_attempts: AtomicU64,
    dial_failures: AtomicU64,
    fetch_failures: AtomicU64,
    head_polls: AtomicU64,
    consecutive_connectivity_failures: AtomicU64,
    restarts: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl ScannerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_window(&self, window: Window) {
        self.window_start.store(window.start, Ordering::Relaxed);
        self.window_end.store(window.end, Ordering::Relaxed);
    }

    pub fn record_head(&self, head: u64) {
        bump(&self.head_polls);
        self.last_head.store(head, Ordering::Relaxed);
    }

    pub fn record_window_applied(&self) {
        bump(&self.windows_applied);
    }

    pub fn record_link_inserted(&self) {
        bump(&self.links_inserted);
    }

    pub fn record_link_duplicate(&self) {
        bump(&self.links_duplicate);
    }

    pub fn record_unlink(&self, removed: u64) {
        bump(&self.unlinks_applied);
        self.records_removed.fetch_add(removed, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        bump(&self.decode_errors);
    }

    pub fn record_persistence_retry(&self) {
        bump(&self.persistence_retries);
    }

    pub fn record_persistence_conflict(&self) {
        bump(&self.persistence_conflicts);
    }

    pub fn record_dial_attempt(&self, ordinal: usize) {
        bump(&self.dial_attempts);
        self.endpoint_ordinal.store(ordinal as u64, Ordering::Relaxed);
    }

    /// A failed dial. Returns the new consecutive-failure count.
    pub fn record_dial_failure(&self) -> u64 {
        bump(&self.dial_failures);
        self.consecutive_connectivity_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// A failed query or head poll. Returns the new consecutive-failure count.
    pub fn record_fetch_failure(&self) -> u64 {
        bump(&self.fetch_failures);
        self.consecutive_connectivity_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Any successful RPC round-trip clears the consecutive-failure streak.
    pub fn record_rpc_success(&self) {
        self.consecutive_connectivity_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        bump(&self.restarts);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            window_start: load(&self.window_start),
            window_end: load(&self.window_end),
            last_head: load(&self.last_head),
            endpoint_ordinal: load(&self.endpoint_ordinal),
            windows_applied: load(&self.windows_applied),
            links_inserted: load(&self.links_inserted),
            links_duplicate: load(&self.links_duplicate),
            unlinks_applied: load(&self.unlinks_applied),
            records_removed: load(&self.records_removed),
            decode_errors: load(&self.decode_errors),
            persistence_retries: load(&self.persistence_retries),
            persistence_conflicts: load(&self.persistence_conflicts),
            dial_attempts: load(&self.dial_attempts),
            dial_failures: load(&self.dial_failures),
            fetch_failures: load(&self.fetch_failures),
            head_polls: load(&self.head_polls),
            consecutive_connectivity_failures: load(&self.consecutive_connectivity_failures),
            restarts: load(&self.restarts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_streak_resets_on_success() {
        let m = ScannerMetrics::new();
        assert_eq!(m.record_dial_failure(), 1);
        assert_eq!(m.record_fetch_failure(), 2);
        m.record_rpc_success();
        let snap = m.snapshot();
        assert_eq!(snap.consecutive_connectivity_failures, 0);
        assert_eq!(snap.dial_failures, 1);
        assert_eq!(snap.fetch_failures, 1);
    }

    #[test]
    fn snapshot_serializes_window() {
        let m = ScannerMetrics::new();
        m.set_window(Window::new(50, 50));
        m.record_head(130);
        let json = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(json["window_start"], 50);
        assert_eq!(json["window_end"], 100);
        assert_eq!(json["last_head"], 130);
        assert_eq!(json["head_polls"], 1);
    }
}
