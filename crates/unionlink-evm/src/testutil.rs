//! Shared fixtures for the scanner tests: log builders, a scripted chain and
//! a connector that hands it out.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use tokio::time::Instant;

use unionlink_core::cursor::Window;
use unionlink_rpc::{Endpoint, EndpointPool, JsonRpcError, TransportError};

use crate::classifier::LogClassifier;
use crate::fetcher::{EvmRpcClient, LogQuery, RawLog};
use crate::reconnect::Connector;

pub fn hex32(b: &B256) -> String {
    format!("0x{}", hex::encode(b))
}

pub fn word(address: Address) -> B256 {
    address.into_word()
}

fn log(c: &LogClassifier, topic0: B256, block: u64, tx: u8, user: Address, identity: Address) -> RawLog {
    RawLog {
        address: format!("0x{}", hex::encode(c.contract().as_slice())),
        topics: vec![hex32(&topic0), hex32(&word(user)), hex32(&word(identity))],
        data: "0x".into(),
        block_number: format!("{block:#x}"),
        block_hash: hex32(&B256::repeat_byte(0xbb)),
        tx_hash: hex32(&B256::repeat_byte(tx)),
        log_index: "0x0".into(),
        removed: Some(false),
    }
}

pub fn link_log(c: &LogClassifier, block: u64, tx: u8, user: Address, identity: Address) -> RawLog {
    log(c, c.signatures().link, block, tx, user, identity)
}

pub fn unlink_log(c: &LogClassifier, block: u64, tx: u8, user: Address, identity: Address) -> RawLog {
    log(c, c.signatures().unlink, block, tx, user, identity)
}

pub fn pool(n: usize) -> EndpointPool {
    let urls = (1..=n).map(|i| format!("http://node-{i}.test")).collect();
    EndpointPool::new(urls).unwrap()
}

// ─── MockChain ───────────────────────────────────────────────────────────────

/// A chain whose head and logs the test controls.
#[derive(Default)]
pub struct MockChain {
    head: AtomicU64,
    logs: Mutex<Vec<RawLog>>,
    get_logs_failures: AtomicU32,
    get_logs_rejections: AtomicU32,
    head_failures: AtomicU32,
    requests: Mutex<Vec<(Window, Instant)>>,
    head_polls: Mutex<Vec<Instant>>,
}

impl MockChain {
    pub fn new(head: u64, logs: Vec<RawLog>) -> Arc<Self> {
        Arc::new(Self {
            head: AtomicU64::new(head),
            logs: Mutex::new(logs),
            ..Default::default()
        })
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Fail the next `n` `eth_getLogs` calls.
    pub fn fail_get_logs(&self, n: u32) {
        self.get_logs_failures.store(n, Ordering::SeqCst);
    }

    /// Answer the next `n` `eth_getLogs` calls with a JSON-RPC error object.
    pub fn reject_get_logs(&self, n: u32) {
        self.get_logs_rejections.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` `eth_blockNumber` calls.
    pub fn fail_head(&self, n: u32) {
        self.head_failures.store(n, Ordering::SeqCst);
    }

    /// Windows requested through `eth_getLogs`, including failed requests.
    pub fn requests(&self) -> Vec<Window> {
        self.requests.lock().unwrap().iter().map(|(w, _)| *w).collect()
    }

    /// When each `eth_getLogs` call arrived.
    pub fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn head_polls(&self) -> Vec<Instant> {
        self.head_polls.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EvmRpcClient for MockChain {
    async fn block_number(&self) -> Result<u64, TransportError> {
        self.head_polls.lock().unwrap().push(Instant::now());
        if Self::take_failure(&self.head_failures) {
            return Err(TransportError::Http("connection reset by peer".into()));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn chain_id(&self) -> Result<u64, TransportError> {
        Ok(56)
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, TransportError> {
        self.requests.lock().unwrap().push((query.window, Instant::now()));
        if Self::take_failure(&self.get_logs_failures) {
            return Err(TransportError::Http("connection reset by peer".into()));
        }
        if Self::take_failure(&self.get_logs_rejections) {
            return Err(TransportError::Rpc(JsonRpcError {
                code: -32005,
                message: "query returned more than 10000 results".into(),
                data: None,
            }));
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.block_number_u64().is_some_and(|b| query.window.contains(b)))
            .cloned()
            .collect())
    }
}

// ─── MockConnector ───────────────────────────────────────────────────────────

/// Hands out the same [`MockChain`] for every endpoint, except the ones
/// marked down.
pub struct MockConnector {
    chain: Arc<MockChain>,
    down: Mutex<HashSet<usize>>,
    dials: Mutex<Vec<(usize, Instant)>>,
}

impl MockConnector {
    pub fn new(chain: Arc<MockChain>) -> Arc<Self> {
        Arc::new(Self {
            chain,
            down: Mutex::new(HashSet::new()),
            dials: Mutex::new(vec![]),
        })
    }

    pub fn set_down(&self, ordinal: usize, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(ordinal);
        } else {
            set.remove(&ordinal);
        }
    }

    pub fn dials(&self) -> Vec<(usize, Instant)> {
        self.dials.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn dial(&self, endpoint: &Endpoint) -> Result<Arc<dyn EvmRpcClient>, TransportError> {
        self.dials.lock().unwrap().push((endpoint.ordinal, Instant::now()));
        if self.down.lock().unwrap().contains(&endpoint.ordinal) {
            return Err(TransportError::Http(format!("{}: connection refused", endpoint.url)));
        }
        Ok(self.chain.clone())
    }
}
