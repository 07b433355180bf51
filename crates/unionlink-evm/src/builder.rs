//! Fluent builder API for creating scanners.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use unionlink_evm::ScannerBuilder;
//! use unionlink_rpc::EndpointPool;
//! use unionlink_storage::InMemoryStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scanner = ScannerBuilder::new()
//!     .contract("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse()?)
//!     .start_block(29_367_000)
//!     .endpoints(EndpointPool::from_env()?)
//!     .store(Arc::new(InMemoryStore::new()))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use alloy_primitives::Address;

use unionlink_core::applier::EventApplier;
use unionlink_core::config::ScannerConfig;
use unionlink_core::error::ScanError;
use unionlink_core::metrics::ScannerMetrics;
use unionlink_core::store::LinkStore;
use unionlink_rpc::EndpointPool;

use crate::classifier::LogClassifier;
use crate::reconnect::{Connector, HttpConnector, Reconnector};
use crate::scan_loop::Scanner;
use crate::signature::LinkSignatures;

/// Fluent builder for [`Scanner`].
#[derive(Default)]
pub struct ScannerBuilder {
    config: ScannerConfig,
    endpoints: Option<EndpointPool>,
    connector: Option<Arc<dyn Connector>>,
    store: Option<Arc<dyn LinkStore>>,
    metrics: Option<Arc<ScannerMetrics>>,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the contract whose events are mirrored.
    pub fn contract(mut self, contract: Address) -> Self {
        self.config.contract = contract;
        self
    }

    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = block;
        self
    }

    /// Set the number of blocks per `eth_getLogs` window.
    pub fn window_size(mut self, size: u64) -> Self {
        self.config.window_size = size;
        self
    }

    /// Set how many blocks a window's end must stay behind the head.
    pub fn confirmation_margin(mut self, margin: u64) -> Self {
        self.config.confirmation_margin = margin;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn catch_up_wait_ms(mut self, ms: u64) -> Self {
        self.config.catch_up_wait_ms = ms;
        self
    }

    /// Set the first reconnect backoff and its ceiling.
    pub fn reconnect_backoff_ms(mut self, initial: u64, max: u64) -> Self {
        self.config.reconnect_backoff_ms = initial;
        self.config.reconnect_backoff_max_ms = max;
        self
    }

    pub fn store_max_retries(mut self, retries: u32) -> Self {
        self.config.store_max_retries = retries;
        self
    }

    pub fn restart_pause_ms(mut self, ms: u64) -> Self {
        self.config.restart_pause_ms = ms;
        self
    }

    pub fn endpoints(mut self, pool: EndpointPool) -> Self {
        self.endpoints = Some(pool);
        self
    }

    /// Override how endpoints are dialed. Defaults to [`HttpConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn store(mut self, store: Arc<dyn LinkStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share counters with another component (e.g. the read API).
    pub fn metrics(mut self, metrics: Arc<ScannerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the `ScannerConfig` alone.
    pub fn build_config(self) -> ScannerConfig {
        self.config
    }

    pub fn build(self) -> Result<Scanner, ScanError> {
        self.config.validate()?;
        let endpoints = self
            .endpoints
            .ok_or_else(|| ScanError::Config("no RPC endpoints configured".into()))?;
        let store = self
            .store
            .ok_or_else(|| ScanError::Config("no link store configured".into()))?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(HttpConnector::default()));
        let metrics = self.metrics.unwrap_or_default();

        let reconnector = Reconnector::new(
            endpoints,
            connector,
            self.config.reconnect_retry(),
            metrics.clone(),
        );
        let classifier = LogClassifier::new(self.config.contract, LinkSignatures::new());
        let applier = EventApplier::new(store, self.config.store_retry(), metrics.clone());

        Ok(Scanner::new(
            self.config,
            reconnector,
            classifier,
            applier,
            metrics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unionlink_storage::InMemoryStore;

    fn pool() -> EndpointPool {
        EndpointPool::new(vec!["http://localhost:8545".into()]).unwrap()
    }

    #[test]
    fn builder_defaults() {
        let cfg = ScannerBuilder::new().build_config();
        assert_eq!(cfg.start_block, 29_367_000);
        assert_eq!(cfg.window_size, 50);
        assert_eq!(cfg.lag(), 70);
    }

    #[test]
    fn builder_custom() {
        let cfg = ScannerBuilder::new()
            .contract(Address::repeat_byte(1))
            .start_block(100)
            .window_size(10)
            .confirmation_margin(5)
            .poll_interval_ms(1_000)
            .reconnect_backoff_ms(1_000, 8_000)
            .build_config();

        assert_eq!(cfg.start_block, 100);
        assert_eq!(cfg.lag(), 15);
        assert_eq!(cfg.reconnect_backoff_max_ms, 8_000);
    }

    #[test]
    fn build_requires_contract_endpoints_and_store() {
        let missing_contract = ScannerBuilder::new()
            .endpoints(pool())
            .store(Arc::new(InMemoryStore::new()))
            .build();
        assert!(matches!(missing_contract, Err(ScanError::Config(_))));

        let missing_store = ScannerBuilder::new()
            .contract(Address::repeat_byte(1))
            .endpoints(pool())
            .build();
        assert!(matches!(missing_store, Err(ScanError::Config(_))));

        let scanner = ScannerBuilder::new()
            .contract(Address::repeat_byte(1))
            .start_block(7)
            .endpoints(pool())
            .store(Arc::new(InMemoryStore::new()))
            .build()
            .unwrap();
        assert_eq!(scanner.window().start, 7);
        assert_eq!(scanner.ordinal().get(), 1);
    }

    #[test]
    fn start_block_without_room_for_a_window_is_rejected() {
        let result = ScannerBuilder::new()
            .contract(Address::repeat_byte(1))
            .start_block(u64::MAX - 10)
            .endpoints(pool())
            .store(Arc::new(InMemoryStore::new()))
            .build();
        assert!(matches!(result, Err(ScanError::Config(_))));
    }
}
