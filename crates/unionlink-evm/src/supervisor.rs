//! Restarts failed scanning runs without restarting the process.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use unionlink_core::error::ScanError;
use unionlink_core::metrics::ScannerMetrics;
use unionlink_core::shutdown::Shutdown;

use crate::scan_loop::Scanner;

pub struct Supervisor {
    scanner: Scanner,
    restart_pause: Duration,
    metrics: Arc<ScannerMetrics>,
}

impl Supervisor {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            restart_pause: scanner.config().restart_pause(),
            metrics: scanner.metrics().clone(),
            scanner,
        }
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Run the scanner until shutdown. Failed runs are restarted after a
    /// pause, from the same window. Configuration errors are returned.
    pub async fn run(mut self, mut shutdown: Shutdown) -> Result<Scanner, ScanError> {
        loop {
            let err = match self.scanner.run(shutdown.clone()).await {
                Ok(()) => return Ok(self.scanner),
                Err(e) => e,
            };
            if err.is_shutdown() {
                info!(window_start = self.scanner.window().start, "scanner stopped");
                return Ok(self.scanner);
            }
            if matches!(err, ScanError::Config(_)) {
                return Err(err);
            }

            self.metrics.record_restart();
            let window = self.scanner.window();
            error!(
                window_start = window.start,
                window_end = window.end,
                ordinal = self.scanner.ordinal().get(),
                error = %err,
                pause_secs = self.restart_pause.as_secs(),
                "scanning run failed, restarting"
            );
            if shutdown.sleep(self.restart_pause).await.is_err() {
                info!("scanner stopped during restart pause");
                return Ok(self.scanner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ScannerBuilder;
    use crate::testutil::{link_log, pool, MockChain, MockConnector};
    use alloy_primitives::Address;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use unionlink_core::cursor::Window;
    use unionlink_core::error::StoreError;
    use unionlink_core::store::{InsertOutcome, LinkStore};
    use unionlink_core::types::{LinkPair, LinkRecord, ScanCheckpoint};
    use unionlink_storage::InMemoryStore;

    /// Store whose first `n` inserts fail fatally.
    struct BrokenStore {
        inner: InMemoryStore,
        fatal: AtomicU32,
    }

    #[async_trait]
    impl LinkStore for BrokenStore {
        async fn insert_link(&self, record: &LinkRecord) -> Result<InsertOutcome, StoreError> {
            if self
                .fatal
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Fatal("pool closed".into()));
            }
            self.inner.insert_link(record).await
        }
        async fn remove_links_for_user(&self, user: &str) -> Result<u64, StoreError> {
            self.inner.remove_links_for_user(user).await
        }
        async fn all_links(&self) -> Result<Vec<LinkPair>, StoreError> {
            self.inner.all_links().await
        }
        async fn load_checkpoint(&self) -> Result<Option<ScanCheckpoint>, StoreError> {
            self.inner.load_checkpoint().await
        }
        async fn save_checkpoint(&self, c: &ScanCheckpoint) -> Result<(), StoreError> {
            self.inner.save_checkpoint(c).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_store_error_restarts_same_window() {
        let contract = Address::repeat_byte(0xc0);
        let classifier = crate::classifier::LogClassifier::new(contract, crate::signature::LinkSignatures::new());
        let log = link_log(&classifier, 10, 0xaa, Address::repeat_byte(0x11), Address::repeat_byte(0x22));
        let chain = MockChain::new(70, vec![log]);
        let store = Arc::new(BrokenStore {
            inner: InMemoryStore::new(),
            fatal: AtomicU32::new(1),
        });
        let scanner = ScannerBuilder::new()
            .contract(contract)
            .start_block(0)
            .endpoints(pool(1))
            .connector(MockConnector::new(chain.clone()))
            .store(store.clone())
            .build()
            .unwrap();

        let (tx, shutdown) = Shutdown::channel();
        let handle = tokio::spawn(Supervisor::new(scanner).run(shutdown));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        tx.send(true).unwrap();
        let scanner = handle.await.unwrap().unwrap();

        assert_eq!(store.inner.len().await, 1);
        assert_eq!(
            chain.requests(),
            vec![Window { start: 0, end: 50 }, Window { start: 0, end: 50 }]
        );
        let snap = scanner.metrics().snapshot();
        assert_eq!(snap.restarts, 1);
        assert_eq!(snap.windows_applied, 1);
        // Head 70 holds the cursor on the replayed window.
        assert_eq!(scanner.window(), Window { start: 0, end: 50 });
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_returns_scanner() {
        let chain = MockChain::new(0, vec![]);
        let scanner = ScannerBuilder::new()
            .contract(Address::repeat_byte(0xc0))
            .start_block(0)
            .endpoints(pool(1))
            .connector(MockConnector::new(chain))
            .store(Arc::new(InMemoryStore::new()))
            .build()
            .unwrap();

        let (tx, shutdown) = Shutdown::channel();
        let handle = tokio::spawn(Supervisor::new(scanner).run(shutdown));
        tokio::time::sleep(Duration::from_secs(60)).await;
        tx.send(true).unwrap();

        let scanner = handle.await.unwrap().unwrap();
        assert_eq!(scanner.metrics().snapshot().restarts, 0);
        assert_eq!(scanner.window().start, 0);
    }
}
