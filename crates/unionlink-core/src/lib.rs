//! unionlink-core — foundation for the Link/UnLink event mirror.
//!
//! # Architecture
//!
//! ```text
//! Scanner (unionlink-evm)
//!     ├── RangeCursor      ([start, end) block window)
//!     ├── CatchUpThrottle  (stay `window + margin` blocks behind head)
//!     ├── EventApplier     (idempotent writes, bounded persistence retry)
//!     ├── ScannerMetrics   (observable counters)
//!     └── LinkStore        (memory / SQLite / Postgres)
//! ```

pub mod applier;
pub mod backoff;
pub mod config;
pub mod cursor;
pub mod error;
pub mod metrics;
pub mod shutdown;
pub mod store;
pub mod throttle;
pub mod types;

pub use applier::{ApplyOutcome, EventApplier};
pub use backoff::{RetryConfig, RetryPolicy};
pub use config::ScannerConfig;
pub use cursor::{RangeCursor, Window};
pub use error::{ScanError, StoreError};
pub use metrics::{MetricsSnapshot, ScannerMetrics};
pub use shutdown::Shutdown;
pub use store::{InsertOutcome, LinkStore};
pub use throttle::CatchUpThrottle;
pub use types::{LinkEvent, LinkPair, LinkRecord, ObservedEvent, ScanCheckpoint};
