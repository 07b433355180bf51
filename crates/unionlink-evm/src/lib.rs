//! unionlink-evm — the scanning engine.
//!
//! ```text
//! Reconnector ──► Scanner picks a window ──► fetch eth_getLogs
//!      ▲                                          │
//!      └──── connectivity failure ◄───────────────┤
//!                                                 ▼
//!              CatchUpThrottle ◄── advance ◄── classify ──► EventApplier
//! ```

pub mod builder;
pub mod classifier;
pub mod fetcher;
pub mod reconnect;
pub mod scan_loop;
pub mod signature;
pub mod supervisor;

pub use builder::ScannerBuilder;
pub use classifier::{DecodeError, LogClassifier};
pub use fetcher::{EvmRpcClient, JsonRpcEvmClient, LogQuery, RawLog};
pub use reconnect::{Connector, HttpConnector, LiveClient, Reconnector};
pub use scan_loop::{Scanner, WindowReport};
pub use signature::LinkSignatures;
pub use supervisor::Supervisor;

#[cfg(test)]
pub(crate) mod testutil;
