//! EVM log fetcher.
//!
//! Wraps a JSON-RPC transport with the three calls the scanner needs:
//! `eth_blockNumber`, `eth_chainId` and `eth_getLogs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use unionlink_core::cursor::Window;
use unionlink_rpc::{RpcTransport, TransportError};

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    #[serde(rename = "data")]
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash", default)]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(rename = "removed", default)]
    pub removed: Option<bool>,
}

impl RawLog {
    pub fn block_number_u64(&self) -> Option<u64> {
        parse_hex_u64(&self.block_number)
    }

    pub fn log_index_u64(&self) -> Option<u64> {
        parse_hex_u64(&self.log_index)
    }

    /// Returns `true` if the node flagged this log as removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }
}

/// One `eth_getLogs` request: the contract, the accepted `topics[0]` values
/// and the half-open block window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub topics: Vec<B256>,
    pub window: Window,
}

impl LogQuery {
    /// The filter object, with `toBlock` set to the window's last block.
    pub fn to_filter(&self) -> Value {
        let topics: Vec<String> = self.topics.iter().map(|t| format!("0x{}", hex::encode(t))).collect();
        json!({
            "address": format!("0x{}", hex::encode(self.address.as_slice())),
            "fromBlock": format!("{:#x}", self.window.start),
            "toBlock": format!("{:#x}", self.window.last_block()),
            "topics": [topics],
        })
    }
}

/// The node operations the scanner depends on.
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, TransportError>;
    async fn chain_id(&self) -> Result<u64, TransportError>;
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, TransportError>;
}

/// [`EvmRpcClient`] over any [`RpcTransport`].
pub struct JsonRpcEvmClient {
    transport: Arc<dyn RpcTransport>,
    next_id: AtomicU64,
}

impl JsonRpcEvmClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.transport.call(id, method, params).await
    }

    async fn call_quantity(&self, method: &str) -> Result<u64, TransportError> {
        let value = self.call(method, vec![]).await?;
        value
            .as_str()
            .and_then(parse_hex_u64)
            .ok_or_else(|| TransportError::Other(format!("{method}: expected hex quantity, got {value}")))
    }
}

#[async_trait]
impl EvmRpcClient for JsonRpcEvmClient {
    async fn block_number(&self) -> Result<u64, TransportError> {
        self.call_quantity("eth_blockNumber").await
    }

    async fn chain_id(&self) -> Result<u64, TransportError> {
        self.call_quantity("eth_chainId").await
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, TransportError> {
        let value = self.call("eth_getLogs", vec![query.to_filter()]).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Parse a hex-encoded quantity (with or without `0x`).
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}
