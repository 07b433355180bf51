//! In-memory storage backend.
//!
//! Holds link records and the scan checkpoint in RAM. Useful for tests and
//! short-lived runs that don't need persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use unionlink_core::error::StoreError;
use unionlink_core::store::{InsertOutcome, LinkStore};
use unionlink_core::types::{LinkPair, LinkRecord, ScanCheckpoint};

/// In-memory link store. All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    links: RwLock<HashMap<String, LinkRecord>>,
    checkpoint: RwLock<Option<ScanCheckpoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, ordered by block then transaction hash.
    pub async fn records(&self) -> Vec<LinkRecord> {
        let mut records: Vec<LinkRecord> = self.links.read().await.values().cloned().collect();
        records.sort_by(|a, b| (a.block_number, &a.tx).cmp(&(b.block_number, &b.tx)));
        records
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.read().await.is_empty()
    }
}

#[async_trait]
impl LinkStore for InMemoryStore {
    async fn insert_link(&self, record: &LinkRecord) -> Result<InsertOutcome, StoreError> {
        let mut links = self.links.write().await;
        if links.contains_key(&record.tx) {
            return Ok(InsertOutcome::Duplicate);
        }
        links.insert(record.tx.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn remove_links_for_user(&self, user: &str) -> Result<u64, StoreError> {
        let mut links = self.links.write().await;
        let before = links.len();
        links.retain(|_, r| r.user != user);
        Ok((before - links.len()) as u64)
    }

    async fn all_links(&self) -> Result<Vec<LinkPair>, StoreError> {
        Ok(self
            .records()
            .await
            .into_iter()
            .map(|r| LinkPair {
                user: r.user,
                identity: r.identity,
            })
            .collect())
    }

    async fn load_checkpoint(&self) -> Result<Option<ScanCheckpoint>, StoreError> {
        Ok(self.checkpoint.read().await.clone())
    }

    async fn save_checkpoint(&self, checkpoint: &ScanCheckpoint) -> Result<(), StoreError> {
        *self.checkpoint.write().await = Some(checkpoint.clone());
        Ok(())
    }
}
