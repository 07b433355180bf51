//! Ordinally-keyed endpoint list with a cyclic failover position.
//!
//! Endpoints are numbered from 1. The pool is configured from `RPC_URL_1`,
//! `RPC_URL_2`, … and enumeration stops at the first missing (or empty)
//! variable. Resolving an ordinal past the end wraps back to 1.

use thiserror::Error;

/// Prefix of the environment variables that list endpoint URLs.
pub const ENV_PREFIX: &str = "RPC_URL_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("no RPC endpoints configured (expected RPC_URL_1, RPC_URL_2, ...)")]
    Empty,

    #[error("endpoint #{ordinal} has an unsupported URL: {url}")]
    InvalidUrl { ordinal: usize, url: String },
}

/// One configured endpoint. No state beyond identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// 1-based position in the pool.
    pub ordinal: usize,
    pub url: String,
}

/// The scanner's current position in the endpoint list.
///
/// Owned by the scanning task and passed by `&mut` wherever failover may
/// happen, so every reconnect continues from where the last one stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointOrdinal(usize);

impl Default for EndpointOrdinal {
    fn default() -> Self {
        Self::first()
    }
}

impl EndpointOrdinal {
    pub fn first() -> Self {
        Self(1)
    }

    pub fn get(&self) -> usize {
        self.0
    }

    /// Move to the next endpoint. Wrapping happens on resolve.
    pub fn advance(&mut self) {
        self.0 = self.0.saturating_add(1);
    }
}

impl std::fmt::Display for EndpointOrdinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-empty, ordered list of endpoint URLs.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    urls: Vec<String>,
}

impl EndpointPool {
    pub fn new(urls: Vec<String>) -> Result<Self, PoolError> {
        if urls.is_empty() {
            return Err(PoolError::Empty);
        }
        for (i, url) in urls.iter().enumerate() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(PoolError::InvalidUrl {
                    ordinal: i + 1,
                    url: url.clone(),
                });
            }
        }
        Ok(Self { urls })
    }

    /// Read `RPC_URL_1..N` from the process environment.
    pub fn from_env() -> Result<Self, PoolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Enumerate `RPC_URL_n` through `lookup`, stopping at the first gap.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PoolError> {
        let mut urls = Vec::new();
        for ordinal in 1.. {
            match lookup(&format!("{ENV_PREFIX}{ordinal}")) {
                Some(url) if !url.trim().is_empty() => urls.push(url.trim().to_string()),
                _ => break,
            }
        }
        Self::new(urls)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Resolve the endpoint at `ordinal`. An ordinal with no endpoint
    /// configured wraps back to 1, and `ordinal` is updated to match.
    pub fn resolve(&self, ordinal: &mut EndpointOrdinal) -> Endpoint {
        if ordinal.0 == 0 || ordinal.0 > self.urls.len() {
            *ordinal = EndpointOrdinal::first();
        }
        Endpoint {
            ordinal: ordinal.0,
            url: self.urls[ordinal.0 - 1].clone(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.urls.iter().enumerate().map(|(i, url)| Endpoint {
            ordinal: i + 1,
            url: url.clone(),
        })
    }
}
