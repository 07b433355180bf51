//! The scan loop — one window at a time, strictly in order.
//!
//! For each window `[start, end)`:
//!   1. `eth_getLogs` for the contract and both topic hashes
//!   2. classify + decode each log; apply decoded events in chain order
//!   3. wait until the head is at least `end + lag`
//!      (sleep `poll_interval`, poll; if behind, sleep `catch_up_wait` too)
//!   4. advance the cursor, save the checkpoint
//!
//! Any connectivity failure (head poll or log query) moves to the next
//! endpoint and retries the same window. A window is never advanced past
//! unless every event in it was applied or deliberately skipped. The
//! checkpoint only moves once the head has cleared the lag, so a restart
//! replays the last applied window before waiting again.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use unionlink_core::applier::{ApplyOutcome, EventApplier};
use unionlink_core::backoff::RetryPolicy;
use unionlink_core::config::ScannerConfig;
use unionlink_core::cursor::{RangeCursor, Window};
use unionlink_core::error::{ScanError, StoreError};
use unionlink_core::metrics::ScannerMetrics;
use unionlink_core::shutdown::Shutdown;
use unionlink_core::throttle::CatchUpThrottle;
use unionlink_core::types::{ObservedEvent, ScanCheckpoint};
use unionlink_rpc::{EndpointOrdinal, TransportError};

use crate::classifier::LogClassifier;
use crate::fetcher::{LogQuery, RawLog};
use crate::reconnect::{LiveClient, Reconnector};

/// What processing one window did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowReport {
    pub logs: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub removed: u64,
    pub skipped: usize,
    pub decode_errors: usize,
}

pub struct Scanner {
    config: ScannerConfig,
    reconnector: Reconnector,
    classifier: LogClassifier,
    applier: EventApplier,
    throttle: CatchUpThrottle,
    fetch_retry: RetryPolicy,
    metrics: Arc<ScannerMetrics>,
    cursor: RangeCursor,
    ordinal: EndpointOrdinal,
    live: Option<LiveClient>,
    resumed: bool,
}

impl Scanner {
    pub(crate) fn new(
        config: ScannerConfig,
        reconnector: Reconnector,
        classifier: LogClassifier,
        applier: EventApplier,
        metrics: Arc<ScannerMetrics>,
    ) -> Self {
        Self {
            throttle: CatchUpThrottle::from_config(&config),
            fetch_retry: RetryPolicy::new(config.fetch_retry()),
            cursor: RangeCursor::new(config.start_block, config.window_size),
            ordinal: EndpointOrdinal::first(),
            live: None,
            resumed: false,
            config,
            reconnector,
            classifier,
            applier,
            metrics,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ScannerMetrics> {
        &self.metrics
    }

    /// The window currently under scan.
    pub fn window(&self) -> Window {
        self.cursor.window()
    }

    pub fn ordinal(&self) -> EndpointOrdinal {
        self.ordinal
    }

    /// Scan until shutdown or a failure the run cannot recover from.
    ///
    /// Cursor and endpoint ordinal live on `self`, so calling `run` again
    /// after an error continues from the same window.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<(), ScanError> {
        self.resume().await?;
        info!(
            window_start = self.cursor.window().start,
            window_end = self.cursor.window().end,
            contract = %self.classifier.contract(),
            "scanner started"
        );

        loop {
            shutdown.check()?;
            let window = self.cursor.window();
            self.metrics.set_window(window);

            match self.process_window(window, &mut shutdown).await {
                Ok(report) => {
                    info!(
                        window_start = window.start,
                        window_end = window.end,
                        logs = report.logs,
                        inserted = report.inserted,
                        duplicates = report.duplicates,
                        removed = report.removed,
                        decode_errors = report.decode_errors,
                        "window applied"
                    );
                }
                Err(ScanError::Storage(e)) if e.is_transient() => {
                    warn!(
                        window_start = window.start,
                        window_end = window.end,
                        error = %e,
                        "store unavailable, window will be replayed"
                    );
                    shutdown.sleep(self.config.restart_pause()).await?;
                    continue;
                }
                Err(e) => return Err(e),
            }

            self.metrics.record_window_applied();

            let head = self.wait_until_ready(window, &mut shutdown).await?;
            let next = self.cursor.advance();
            debug!(head, window_start = next.start, window_end = next.end, "advanced");
            self.save_checkpoint(next.start).await?;
        }
    }

    /// Fetch, classify and apply one window. Does not move the cursor.
    pub async fn process_window(
        &mut self,
        window: Window,
        shutdown: &mut Shutdown,
    ) -> Result<WindowReport, ScanError> {
        let logs = self.fetch_window(window, shutdown).await?;
        let mut report = WindowReport {
            logs: logs.len(),
            ..Default::default()
        };

        let events = self.decode_window(window, &logs, &mut report);
        for observed in &events {
            match self.applier.apply(observed, shutdown).await? {
                ApplyOutcome::Inserted => report.inserted += 1,
                ApplyOutcome::Duplicate => report.duplicates += 1,
                ApplyOutcome::Removed(n) => report.removed += n,
                ApplyOutcome::Skipped => report.skipped += 1,
            }
        }
        Ok(report)
    }

    // ─── Resume ──────────────────────────────────────────────────────────────

    async fn resume(&mut self) -> Result<(), ScanError> {
        if self.resumed {
            return Ok(());
        }
        if let Some(cp) = self.applier.store().load_checkpoint().await? {
            if self.cursor.resume_from(cp.next_block) {
                info!(next_block = cp.next_block, "resuming from checkpoint");
            } else {
                debug!(
                    next_block = cp.next_block,
                    start_block = self.config.start_block,
                    "checkpoint behind start block, ignored"
                );
            }
        }
        self.resumed = true;
        Ok(())
    }

    async fn save_checkpoint(&self, next_block: u64) -> Result<(), ScanError> {
        let checkpoint = ScanCheckpoint::now(next_block);
        match self.applier.store().save_checkpoint(&checkpoint).await {
            Ok(()) => Ok(()),
            Err(e @ StoreError::Fatal(_)) => Err(e.into()),
            // Replaying an applied window is idempotent; the next save catches up.
            Err(e) => {
                warn!(next_block, error = %e, "checkpoint not saved");
                Ok(())
            }
        }
    }

    // ─── Throttle ────────────────────────────────────────────────────────────

    /// Poll the head until the cursor may move past `window`. Returns the
    /// head seen.
    async fn wait_until_ready(
        &mut self,
        window: Window,
        shutdown: &mut Shutdown,
    ) -> Result<u64, ScanError> {
        loop {
            shutdown.sleep(self.throttle.poll_interval()).await?;

            let live = self.live_client(shutdown).await?;
            let head = match live.client.block_number().await {
                Ok(head) => head,
                Err(e) => {
                    self.connectivity_failure("eth_blockNumber", window, &live, e);
                    continue;
                }
            };
            self.metrics.record_rpc_success();
            self.metrics.record_head(head);

            if self.throttle.is_ready(window, head) {
                return Ok(head);
            }
            debug!(
                head,
                required = self.throttle.required_head(window),
                window_end = window.end,
                "head not far enough ahead, waiting"
            );
            shutdown.sleep(self.throttle.catch_up_wait()).await?;
        }
    }

    // ─── Fetch ───────────────────────────────────────────────────────────────

    async fn fetch_window(
        &mut self,
        window: Window,
        shutdown: &mut Shutdown,
    ) -> Result<Vec<RawLog>, ScanError> {
        let query = LogQuery {
            address: self.classifier.contract(),
            topics: self.classifier.signatures().topics(),
            window,
        };
        let mut failures = 0u32;
        loop {
            let live = self.live_client(shutdown).await?;
            match live.client.get_logs(&query).await {
                Ok(logs) => {
                    self.metrics.record_rpc_success();
                    return Ok(logs);
                }
                Err(e) => {
                    self.connectivity_failure("eth_getLogs", window, &live, e);
                    failures = failures.saturating_add(1);
                    let delay = self
                        .fetch_retry
                        .next_delay(failures)
                        .unwrap_or(self.fetch_retry.config.max_backoff);
                    shutdown.sleep(delay).await?;
                }
            }
        }
    }

    async fn live_client(&mut self, shutdown: &mut Shutdown) -> Result<LiveClient, ScanError> {
        if let Some(live) = &self.live {
            return Ok(live.clone());
        }
        let live = self.reconnector.acquire(&mut self.ordinal, shutdown).await?;
        self.live = Some(live.clone());
        Ok(live)
    }

    /// Drop the current client and point the ordinal at the next endpoint.
    fn connectivity_failure(&mut self, call: &str, window: Window, live: &LiveClient, e: TransportError) {
        let streak = self.metrics.record_fetch_failure();
        if e.is_node_error() {
            // The node is reachable but refused the call (range too large,
            // pruned state, rate limit); another node may accept it.
            warn!(
                call,
                window_start = window.start,
                window_end = window.end,
                ordinal = live.endpoint.ordinal,
                url = %live.endpoint.url,
                error = %e,
                consecutive_failures = streak,
                "node rejected RPC call, failing over"
            );
        } else {
            warn!(
                call,
                window_start = window.start,
                window_end = window.end,
                ordinal = live.endpoint.ordinal,
                url = %live.endpoint.url,
                error = %e,
                consecutive_failures = streak,
                "RPC call failed, failing over"
            );
        }
        self.live = None;
        self.ordinal.advance();
    }

    // ─── Decode ──────────────────────────────────────────────────────────────

    /// Decode the window's logs in chain order. Undecodable logs are
    /// reported and dropped.
    fn decode_window(
        &self,
        window: Window,
        logs: &[RawLog],
        report: &mut WindowReport,
    ) -> Vec<ObservedEvent> {
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            match self.classifier.classify(log) {
                Ok(Some(observed)) if window.contains(observed.block_number) => events.push(observed),
                Ok(Some(observed)) => {
                    warn!(
                        tx_hash = %observed.tx_hex(),
                        block = observed.block_number,
                        window_start = window.start,
                        window_end = window.end,
                        "node returned a log outside the requested window, ignored"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    self.metrics.record_decode_error();
                    report.decode_errors += 1;
                    error!(
                        tx_hash = %log.tx_hash,
                        block = %log.block_number,
                        window_start = window.start,
                        window_end = window.end,
                        error = %e,
                        "undecodable log skipped"
                    );
                }
            }
        }
        events.sort_by_key(|e| (e.block_number, e.log_index));
        events
    }
}
