//! unionlink-storage — [`LinkStore`] backends.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - `sqlite` — SQLite via `sqlx` (embedded, single-file persistence)
//! - `postgres` — PostgreSQL via `sqlx`
//!
//! [`connect`] picks a backend from a `DATABASE_URL`-style string.

use std::sync::Arc;

use unionlink_core::error::StoreError;
use unionlink_core::store::LinkStore;

pub mod memory;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod classify;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Open the store named by `url` and create its schema.
///
/// - `memory` → [`InMemoryStore`]
/// - `sqlite:…` → `SqliteStore` (feature `sqlite`)
/// - `postgres://…` / `postgresql://…` → `PostgresStore` (feature `postgres`)
pub async fn connect(url: &str) -> Result<Arc<dyn LinkStore>, StoreError> {
    if url == "memory" {
        return Ok(Arc::new(InMemoryStore::new()));
    }

    if url.starts_with("sqlite:") {
        #[cfg(feature = "sqlite")]
        return Ok(Arc::new(SqliteStore::open(url).await?));
        #[cfg(not(feature = "sqlite"))]
        return Err(StoreError::Fatal("built without the `sqlite` feature".into()));
    }

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        #[cfg(feature = "postgres")]
        return Ok(Arc::new(PostgresStore::connect(url).await?));
        #[cfg(not(feature = "postgres"))]
        return Err(StoreError::Fatal("built without the `postgres` feature".into()));
    }

    Err(StoreError::Fatal(format!("unsupported database URL: {url}")))
}
