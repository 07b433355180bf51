//! Log classifier — matches raw logs against the contract and the two topic
//! hashes, and decodes matches into [`ObservedEvent`]s.
//!
//! Both events carry two `address` parameters. Every indexing layout the ABI
//! allows is accepted:
//!
//! | topics | data     | user        | identity    |
//! |--------|----------|-------------|-------------|
//! | 3      | empty    | `topics[1]` | `topics[2]` |
//! | 2      | 1 word   | `topics[1]` | data word 0 |
//! | 1      | 2 words  | data word 0 | data word 1 |

use std::str::FromStr;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256};
use thiserror::Error;

use unionlink_core::types::{LinkEvent, ObservedEvent};

use crate::fetcher::RawLog;
use crate::signature::{EventKind, LinkSignatures};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("unexpected layout: {topics} topics, {data_len} data bytes")]
    UnexpectedLayout { topics: usize, data_len: usize },

    #[error("word is not a left-padded address: 0x{0}")]
    DirtyPadding(String),

    #[error("ABI decode failed: {0}")]
    Abi(String),
}

/// Decides whether a raw log is ours, and decodes it if so.
#[derive(Debug, Clone)]
pub struct LogClassifier {
    contract: Address,
    signatures: LinkSignatures,
}

impl LogClassifier {
    pub fn new(contract: Address, signatures: LinkSignatures) -> Self {
        Self {
            contract,
            signatures,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn signatures(&self) -> &LinkSignatures {
        &self.signatures
    }

    /// `Ok(None)` for logs that are not `Link`/`UnLink` from the contract,
    /// and for logs the node flagged as removed.
    pub fn classify(&self, log: &RawLog) -> Result<Option<ObservedEvent>, DecodeError> {
        if log.is_removed() {
            return Ok(None);
        }
        // Parsing to bytes makes the comparison case-insensitive.
        let address = Address::from_str(&log.address).map_err(|_| invalid("address", &log.address))?;
        if address != self.contract {
            return Ok(None);
        }

        let topics = log
            .topics
            .iter()
            .map(|t| B256::from_str(t).map_err(|_| invalid("topic", t)))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(kind) = topics.first().and_then(|t0| self.signatures.kind_of(t0)) else {
            return Ok(None);
        };

        let data = decode_hex(&log.data).ok_or_else(|| invalid("data", &log.data))?;
        let (user, identity) = decode_pair(&topics, &data)?;

        let tx_hash = B256::from_str(&log.tx_hash).map_err(|_| invalid("transactionHash", &log.tx_hash))?;
        let block_number = log
            .block_number_u64()
            .ok_or_else(|| invalid("blockNumber", &log.block_number))?;
        let log_index = log.log_index_u64().ok_or_else(|| invalid("logIndex", &log.log_index))?;

        let event = match kind {
            EventKind::Link => LinkEvent::Link { user, identity },
            EventKind::UnLink => LinkEvent::UnLink { user, identity },
        };
        Ok(Some(ObservedEvent {
            event,
            tx_hash,
            block_number,
            log_index,
        }))
    }
}

fn invalid(field: &'static str, value: &str) -> DecodeError {
    DecodeError::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok()
}

/// A 32-byte word holding an address: 12 zero bytes, then 20 address bytes.
fn word_to_address(word: &B256) -> Result<Address, DecodeError> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(DecodeError::DirtyPadding(hex::encode(word)));
    }
    Ok(Address::from_word(*word))
}

fn decode_pair(topics: &[B256], data: &[u8]) -> Result<(Address, Address), DecodeError> {
    match (topics.len(), data.len()) {
        (3, 0) => Ok((word_to_address(&topics[1])?, word_to_address(&topics[2])?)),
        (2, 32) => Ok((
            word_to_address(&topics[1])?,
            word_to_address(&B256::from_slice(data))?,
        )),
        (1, 64) => {
            // Reject dirty padding up front; the ABI decoder does not check it.
            word_to_address(&B256::from_slice(&data[..32]))?;
            word_to_address(&B256::from_slice(&data[32..]))?;

            let ty = DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Address]);
            let decoded = ty.abi_decode(data).map_err(|e| DecodeError::Abi(e.to_string()))?;
            match decoded {
                DynSolValue::Tuple(values) => match values.as_slice() {
                    [DynSolValue::Address(user), DynSolValue::Address(identity)] => {
                        Ok((*user, *identity))
                    }
                    _ => Err(DecodeError::Abi("expected (address,address)".into())),
                },
                _ => Err(DecodeError::Abi("expected a tuple".into())),
            }
        }
        (topics, data_len) => Err(DecodeError::UnexpectedLayout { topics, data_len }),
    }
}
