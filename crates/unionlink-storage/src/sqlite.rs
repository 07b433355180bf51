//! SQLite storage backend.
//!
//! Persists link records and the scan checkpoint to a single SQLite file,
//! using `sqlx` with WAL mode so the read API does not block the scanner.
//!
//! # Usage
//! ```rust,no_run
//! use unionlink_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./links.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use unionlink_core::error::StoreError;
use unionlink_core::store::{InsertOutcome, LinkStore};
use unionlink_core::types::{LinkPair, LinkRecord, ScanCheckpoint};

use crate::classify::{classify, Backend};

fn db_err(e: sqlx::Error) -> StoreError {
    classify(Backend::Sqlite, e)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./links.db"`) or a full
    /// SQLite URL (`"sqlite:./links.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        if url.contains(":memory:") {
            return Self::in_memory().await;
        }

        let pool = SqlitePool::connect(&url).await.map_err(db_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every pooled connection would get its own private database, so the
    /// pool is pinned to one connection that is never recycled.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS Link (
                tx           TEXT    NOT NULL PRIMARY KEY,
                block_number INTEGER NOT NULL,
                \"user\"     TEXT    NOT NULL,
                identity     TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_link_user ON Link (\"user\");")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scan_checkpoint (
                id         INTEGER NOT NULL PRIMARY KEY CHECK (id = 1),
                next_block INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl LinkStore for SqliteStore {
    async fn insert_link(&self, record: &LinkRecord) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO Link (tx, block_number, \"user\", identity)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.tx)
        .bind(record.block_number as i64)
        .bind(&record.user)
        .bind(&record.identity)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            debug!(tx_hash = %record.tx, "link already present");
            return Ok(InsertOutcome::Duplicate);
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn remove_links_for_user(&self, user: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM Link WHERE \"user\" = ?")
            .bind(user)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn all_links(&self) -> Result<Vec<LinkPair>, StoreError> {
        let rows = sqlx::query("SELECT \"user\", identity FROM Link ORDER BY block_number, tx")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|r| LinkPair {
                user: r.get("user"),
                identity: r.get("identity"),
            })
            .collect())
    }

    async fn load_checkpoint(&self) -> Result<Option<ScanCheckpoint>, StoreError> {
        let row = sqlx::query("SELECT next_block, updated_at FROM scan_checkpoint WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(|r| ScanCheckpoint {
            next_block: r.get::<i64, _>("next_block") as u64,
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save_checkpoint(&self, checkpoint: &ScanCheckpoint) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO scan_checkpoint (id, next_block, updated_at)
             VALUES (1, ?, ?)",
        )
        .bind(checkpoint.next_block as i64)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        debug!(next_block = checkpoint.next_block, "checkpoint saved");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
