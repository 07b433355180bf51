//! Event topic hashes.
//!
//! `topics[0]` of an EVM log is the keccak256 of the event's canonical
//! signature string. Both monitored events take `(address,address)`:
//!   keccak256("Link(address,address)")
//!   keccak256("UnLink(address,address)")

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

pub const LINK_SIGNATURE: &str = "Link(address,address)";
pub const UNLINK_SIGNATURE: &str = "UnLink(address,address)";

/// keccak256 of a canonical event signature string.
pub fn keccak256_signature(signature: &str) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    B256::from(output)
}

/// Which of the two monitored events a topic hash names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Link,
    UnLink,
}

/// The two topic hashes, computed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSignatures {
    pub link: B256,
    pub unlink: B256,
}

impl Default for LinkSignatures {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkSignatures {
    pub fn new() -> Self {
        Self {
            link: keccak256_signature(LINK_SIGNATURE),
            unlink: keccak256_signature(UNLINK_SIGNATURE),
        }
    }

    /// `topics[0]` alternatives for `eth_getLogs`.
    pub fn topics(&self) -> Vec<B256> {
        vec![self.link, self.unlink]
    }

    pub fn kind_of(&self, topic0: &B256) -> Option<EventKind> {
        if *topic0 == self.link {
            Some(EventKind::Link)
        } else if *topic0 == self.unlink {
            Some(EventKind::UnLink)
        } else {
            None
        }
    }
}
