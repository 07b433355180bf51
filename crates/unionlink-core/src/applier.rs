//! Event applier — turns a decoded event into an idempotent store write.
//!
//! - `Link`   → insert `(tx, block, user, identity)`; an existing `tx` is a no-op.
//! - `UnLink` → remove every record whose `user` is the event's user.
//!
//! Store failures are handled by class:
//! - transient: retried in place with bounded backoff, then surfaced so the
//!   scanner replays the whole window;
//! - conflict: logged, counted, event skipped;
//! - fatal: surfaced immediately.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::backoff::{RetryConfig, RetryPolicy};
use crate::error::{ScanError, StoreError};
use crate::metrics::ScannerMetrics;
use crate::shutdown::Shutdown;
use crate::store::{InsertOutcome, LinkStore};
use crate::types::{format_address, LinkEvent, LinkRecord, ObservedEvent};

/// What applying one event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Duplicate,
    /// Number of records removed by an `UnLink`.
    Removed(u64),
    /// The store rejected the write as a conflict; the event was skipped.
    Skipped,
}

pub struct EventApplier {
    store: Arc<dyn LinkStore>,
    retry: RetryPolicy,
    metrics: Arc<ScannerMetrics>,
}

impl EventApplier {
    pub fn new(store: Arc<dyn LinkStore>, retry: RetryConfig, metrics: Arc<ScannerMetrics>) -> Self {
        Self {
            store,
            retry: RetryPolicy::new(retry),
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<dyn LinkStore> {
        &self.store
    }

    /// Apply one event, retrying transient store failures.
    pub async fn apply(
        &self,
        observed: &ObservedEvent,
        shutdown: &mut Shutdown,
    ) -> Result<ApplyOutcome, ScanError> {
        let tx = observed.tx_hex();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.apply_once(observed).await {
                Ok(outcome) => {
                    self.record(observed, &tx, outcome);
                    return Ok(outcome);
                }
                Err(StoreError::Conflict(reason)) => {
                    warn!(
                        tx_hash = %tx,
                        block = observed.block_number,
                        event = observed.event.name(),
                        %reason,
                        "conflicting write skipped"
                    );
                    self.metrics.record_persistence_conflict();
                    return Ok(ApplyOutcome::Skipped);
                }
                Err(e) if e.is_transient() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            tx_hash = %tx,
                            block = observed.block_number,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying store write"
                        );
                        self.metrics.record_persistence_retry();
                        shutdown.sleep(delay).await?;
                    }
                    None => {
                        error!(
                            tx_hash = %tx,
                            block = observed.block_number,
                            attempt,
                            error = %e,
                            "store write retries exhausted"
                        );
                        return Err(e.into());
                    }
                },
                Err(e) => {
                    error!(tx_hash = %tx, block = observed.block_number, error = %e, "store unusable");
                    return Err(e.into());
                }
            }
        }
    }

    async fn apply_once(&self, observed: &ObservedEvent) -> Result<ApplyOutcome, StoreError> {
        match observed.event {
            LinkEvent::Link { user, identity } => {
                let record =
                    LinkRecord::new(&observed.tx_hash, observed.block_number, &user, &identity);
                Ok(match self.store.insert_link(&record).await? {
                    InsertOutcome::Inserted => ApplyOutcome::Inserted,
                    InsertOutcome::Duplicate => ApplyOutcome::Duplicate,
                })
            }
            LinkEvent::UnLink { user, .. } => {
                let removed = self.store.remove_links_for_user(&format_address(&user)).await?;
                Ok(ApplyOutcome::Removed(removed))
            }
        }
    }

    fn record(&self, observed: &ObservedEvent, tx: &str, outcome: ApplyOutcome) {
        let user = format_address(&observed.event.user());
        let identity = format_address(&observed.event.identity());
        match outcome {
            ApplyOutcome::Inserted => {
                self.metrics.record_link_inserted();
                info!(tx_hash = %tx, block = observed.block_number, %user, %identity, "link stored");
            }
            ApplyOutcome::Duplicate => {
                self.metrics.record_link_duplicate();
                debug!(tx_hash = %tx, block = observed.block_number, "link already stored");
            }
            ApplyOutcome::Removed(n) => {
                self.metrics.record_unlink(n);
                info!(tx_hash = %tx, block = observed.block_number, %user, %identity, removed = n, "unlink applied");
            }
            ApplyOutcome::Skipped => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LinkPair, ScanCheckpoint};
    use alloy_primitives::{Address, B256};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Map-backed store whose next calls can be scripted to fail.
    #[derive(Default)]
    struct ScriptedStore {
        rows: Mutex<BTreeMap<String, LinkRecord>>,
        failures: Mutex<VecDeque<StoreError>>,
    }

    impl ScriptedStore {
        fn failing(errors: Vec<StoreError>) -> Self {
            Self {
                failures: Mutex::new(errors.into()),
                ..Default::default()
            }
        }

        fn next_failure(&self) -> Result<(), StoreError> {
            match self.failures.lock().unwrap().pop_front() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LinkStore for ScriptedStore {
        async fn insert_link(&self, record: &LinkRecord) -> Result<InsertOutcome, StoreError> {
            self.next_failure()?;
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&record.tx) {
                return Ok(InsertOutcome::Duplicate);
            }
            rows.insert(record.tx.clone(), record.clone());
            Ok(InsertOutcome::Inserted)
        }

        async fn remove_links_for_user(&self, user: &str) -> Result<u64, StoreError> {
            self.next_failure()?;
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|_, r| r.user != user);
            Ok((before - rows.len()) as u64)
        }

        async fn all_links(&self) -> Result<Vec<LinkPair>, StoreError> {
            Ok(vec![])
        }

        async fn load_checkpoint(&self) -> Result<Option<ScanCheckpoint>, StoreError> {
            Ok(None)
        }

        async fn save_checkpoint(&self, _c: &ScanCheckpoint) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn applier(store: Arc<ScriptedStore>) -> (EventApplier, Arc<ScannerMetrics>) {
        let metrics = Arc::new(ScannerMetrics::new());
        let retry = RetryConfig::bounded(3, Duration::from_millis(500), Duration::from_secs(8));
        (EventApplier::new(store, retry, metrics.clone()), metrics)
    }

    fn link(tx: u8, user: u8, identity: u8) -> ObservedEvent {
        ObservedEvent {
            event: LinkEvent::Link {
                user: Address::repeat_byte(user),
                identity: Address::repeat_byte(identity),
            },
            tx_hash: B256::repeat_byte(tx),
            block_number: 10,
            log_index: 0,
        }
    }

    fn unlink(tx: u8, user: u8, identity: u8) -> ObservedEvent {
        ObservedEvent {
            event: LinkEvent::UnLink {
                user: Address::repeat_byte(user),
                identity: Address::repeat_byte(identity),
            },
            tx_hash: B256::repeat_byte(tx),
            block_number: 60,
            log_index: 0,
        }
    }

    #[tokio::test]
    async fn link_is_idempotent() {
        let store = Arc::new(ScriptedStore::default());
        let (applier, metrics) = applier(store.clone());
        let mut shutdown = Shutdown::never();

        assert_eq!(applier.apply(&link(0xaa, 1, 2), &mut shutdown).await.unwrap(), ApplyOutcome::Inserted);
        assert_eq!(applier.apply(&link(0xaa, 1, 2), &mut shutdown).await.unwrap(), ApplyOutcome::Duplicate);
        assert_eq!(store.len(), 1);

        let snap = metrics.snapshot();
        assert_eq!(snap.links_inserted, 1);
        assert_eq!(snap.links_duplicate, 1);
    }

    #[tokio::test]
    async fn unlink_removes_every_record_for_user() {
        let store = Arc::new(ScriptedStore::default());
        let (applier, _) = applier(store.clone());
        let mut shutdown = Shutdown::never();

        applier.apply(&link(0x01, 1, 2), &mut shutdown).await.unwrap();
        applier.apply(&link(0x02, 1, 3), &mut shutdown).await.unwrap();
        applier.apply(&link(0x03, 4, 2), &mut shutdown).await.unwrap();

        let outcome = applier.apply(&unlink(0x04, 1, 2), &mut shutdown).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Removed(2));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_in_place() {
        let store = Arc::new(ScriptedStore::failing(vec![
            StoreError::Transient("database is locked".into()),
            StoreError::Transient("database is locked".into()),
        ]));
        let (applier, metrics) = applier(store.clone());
        let mut shutdown = Shutdown::never();

        let started = tokio::time::Instant::now();
        let outcome = applier.apply(&link(0xaa, 1, 2), &mut shutdown).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Inserted);
        // 500ms + 1000ms of backoff
        assert_eq!(started.elapsed(), Duration::from_millis(1_500));
        assert_eq!(metrics.snapshot().persistence_retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_surface_after_budget() {
        let store = Arc::new(ScriptedStore::failing(
            (0..10).map(|_| StoreError::Transient("timeout".into())).collect(),
        ));
        let (applier, _) = applier(store.clone());
        let mut shutdown = Shutdown::never();

        let err = applier.apply(&link(0xaa, 1, 2), &mut shutdown).await.unwrap_err();
        assert!(matches!(err, ScanError::Storage(StoreError::Transient(_))));
        assert!(!err.is_fatal());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn conflict_is_skipped() {
        let store = Arc::new(ScriptedStore::failing(vec![StoreError::Conflict(
            "value too long".into(),
        )]));
        let (applier, metrics) = applier(store.clone());
        let mut shutdown = Shutdown::never();

        let outcome = applier.apply(&link(0xaa, 1, 2), &mut shutdown).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Skipped);
        assert_eq!(metrics.snapshot().persistence_conflicts, 1);
    }

    #[tokio::test]
    async fn fatal_surfaces_immediately() {
        let store = Arc::new(ScriptedStore::failing(vec![StoreError::Fatal("pool closed".into())]));
        let (applier, metrics) = applier(store.clone());
        let mut shutdown = Shutdown::never();

        let err = applier.apply(&link(0xaa, 1, 2), &mut shutdown).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(metrics.snapshot().persistence_retries, 0);
    }
}
