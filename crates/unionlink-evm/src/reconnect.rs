//! Endpoint reconnector — produces one live client on demand, cycling through
//! the endpoint pool and backing off between failed dials.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use unionlink_core::backoff::{RetryConfig, RetryPolicy};
use unionlink_core::error::ScanError;
use unionlink_core::metrics::ScannerMetrics;
use unionlink_core::shutdown::Shutdown;
use unionlink_rpc::{
    Endpoint, EndpointOrdinal, EndpointPool, HttpClientConfig, HttpRpcClient, TransportError,
};

use crate::fetcher::{EvmRpcClient, JsonRpcEvmClient};

/// Turns an endpoint into a connected client.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, endpoint: &Endpoint) -> Result<Arc<dyn EvmRpcClient>, TransportError>;
}

/// Dials HTTP endpoints: builds the client and checks it answers `eth_chainId`.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    config: HttpClientConfig,
}

impl HttpConnector {
    pub fn new(config: HttpClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn dial(&self, endpoint: &Endpoint) -> Result<Arc<dyn EvmRpcClient>, TransportError> {
        let transport = HttpRpcClient::new(endpoint.url.clone(), self.config.clone())?;
        let client = JsonRpcEvmClient::new(Arc::new(transport));
        let chain_id = client.chain_id().await?;
        tracing::debug!(ordinal = endpoint.ordinal, url = %endpoint.url, chain_id, "endpoint answered eth_chainId");
        Ok(Arc::new(client))
    }
}

/// A connected client and the endpoint it talks to.
#[derive(Clone)]
pub struct LiveClient {
    pub endpoint: Endpoint,
    pub client: Arc<dyn EvmRpcClient>,
}

impl std::fmt::Debug for LiveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveClient").field("endpoint", &self.endpoint).finish()
    }
}

pub struct Reconnector {
    pool: EndpointPool,
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    metrics: Arc<ScannerMetrics>,
}

impl Reconnector {
    pub fn new(
        pool: EndpointPool,
        connector: Arc<dyn Connector>,
        retry: RetryConfig,
        metrics: Arc<ScannerMetrics>,
    ) -> Self {
        Self {
            pool,
            connector,
            retry: RetryPolicy::new(retry),
            metrics,
        }
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// Dial the endpoint at `ordinal`, moving on to the next one after each
    /// failure. Returns only with a live client, or on shutdown.
    ///
    /// `ordinal` is left pointing at the endpoint that answered.
    pub async fn acquire(
        &self,
        ordinal: &mut EndpointOrdinal,
        shutdown: &mut Shutdown,
    ) -> Result<LiveClient, ScanError> {
        let mut failures = 0u32;
        loop {
            shutdown.check()?;
            let endpoint = self.pool.resolve(ordinal);
            self.metrics.record_dial_attempt(endpoint.ordinal);

            match self.connector.dial(&endpoint).await {
                Ok(client) => {
                    info!(ordinal = endpoint.ordinal, url = %endpoint.url, "connected to RPC endpoint");
                    return Ok(LiveClient { endpoint, client });
                }
                Err(e) => {
                    failures += 1;
                    let streak = self.metrics.record_dial_failure();
                    let delay = self
                        .retry
                        .next_delay(failures)
                        .unwrap_or(self.retry.config.max_backoff);
                    warn!(
                        ordinal = endpoint.ordinal,
                        url = %endpoint.url,
                        error = %e,
                        delay_secs = delay.as_secs(),
                        consecutive_failures = streak,
                        "dial failed, trying next endpoint after backoff"
                    );
                    shutdown.sleep(delay).await?;
                    ordinal.advance();
                }
            }
        }
    }
}
