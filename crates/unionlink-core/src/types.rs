//! Shared types for the scanning pipeline.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

// ─── LinkEvent ───────────────────────────────────────────────────────────────

/// A decoded `Link` / `UnLink` contract event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Link { user: Address, identity: Address },
    UnLink { user: Address, identity: Address },
}

impl LinkEvent {
    /// The Solidity event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Link { .. } => "Link",
            Self::UnLink { .. } => "UnLink",
        }
    }

    pub fn user(&self) -> Address {
        match self {
            Self::Link { user, .. } | Self::UnLink { user, .. } => *user,
        }
    }

    pub fn identity(&self) -> Address {
        match self {
            Self::Link { identity, .. } | Self::UnLink { identity, .. } => *identity,
        }
    }
}

// ─── ObservedEvent ───────────────────────────────────────────────────────────

/// A decoded event together with where it was emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEvent {
    pub event: LinkEvent,
    /// Transaction hash. Identifies the persisted record.
    pub tx_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
}

impl ObservedEvent {
    /// `0x`-prefixed lowercase transaction hash.
    pub fn tx_hex(&self) -> String {
        format_tx_hash(&self.tx_hash)
    }
}

// ─── LinkRecord ──────────────────────────────────────────────────────────────

/// A persisted link row. Keyed by transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// `0x`-prefixed lowercase transaction hash.
    pub tx: String,
    pub block_number: u64,
    /// EIP-55 checksummed address.
    pub user: String,
    /// EIP-55 checksummed address.
    pub identity: String,
}

impl LinkRecord {
    pub fn new(tx_hash: &B256, block_number: u64, user: &Address, identity: &Address) -> Self {
        Self {
            tx: format_tx_hash(tx_hash),
            block_number,
            user: format_address(user),
            identity: format_address(identity),
        }
    }
}

/// The `(user, identity)` pair served by the read API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPair {
    pub user: String,
    pub identity: String,
}

// ─── ScanCheckpoint ──────────────────────────────────────────────────────────

/// Persisted scan progress: the first block of the next window to scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    pub next_block: u64,
    /// Unix timestamp (seconds) of when the checkpoint was written.
    pub updated_at: i64,
}

impl ScanCheckpoint {
    pub fn now(next_block: u64) -> Self {
        Self {
            next_block,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

// ─── Text encodings ──────────────────────────────────────────────────────────

/// EIP-55 checksummed `0x…` form of an address.
pub fn format_address(address: &Address) -> String {
    address.to_checksum(None)
}

/// `0x`-prefixed lowercase hex of a 32-byte hash.
pub fn format_tx_hash(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash))
}
