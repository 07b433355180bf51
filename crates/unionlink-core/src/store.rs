//! The persistent store shared by the scanner (sole writer) and the read API.
//!
//! Implementations live in `unionlink-storage`: `InMemoryStore`,
//! `SqliteStore` and `PostgresStore`.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{LinkPair, LinkRecord, ScanCheckpoint};

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same transaction hash already existed. No-op.
    Duplicate,
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Insert a link keyed by its transaction hash.
    /// Re-inserting an existing hash returns [`InsertOutcome::Duplicate`].
    async fn insert_link(&self, record: &LinkRecord) -> Result<InsertOutcome, StoreError>;

    /// Remove every record whose `user` equals `user`. Returns the count removed.
    async fn remove_links_for_user(&self, user: &str) -> Result<u64, StoreError>;

    /// All persisted `(user, identity)` pairs.
    async fn all_links(&self) -> Result<Vec<LinkPair>, StoreError>;

    /// Load the persisted scan position, if any.
    async fn load_checkpoint(&self) -> Result<Option<ScanCheckpoint>, StoreError>;

    /// Save (upsert) the scan position.
    async fn save_checkpoint(&self, checkpoint: &ScanCheckpoint) -> Result<(), StoreError>;
}
