//! Error types for the scanning pipeline.

use thiserror::Error;

/// Errors that end or interrupt a scanning run.
///
/// Connectivity failures never surface here as fatal: the scanner retries them
/// internally. What reaches the supervisor is either a shutdown request or a
/// condition the current run cannot recover from on its own.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scanner shut down")]
    Shutdown,
}

impl ScanError {
    /// Returns `true` if the error is a requested shutdown (not a failure).
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// Returns `true` if retrying the same run cannot help.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Storage(e) => e.is_fatal(),
            Self::Shutdown => false,
        }
    }
}

/// Errors reported by a [`LinkStore`](crate::store::LinkStore) backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Temporary condition (I/O, pool exhaustion, lock contention). Retry.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// The write was rejected for this record only. Skip it.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// The backend is unusable (closed pool, bad configuration).
    #[error("fatal storage failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
