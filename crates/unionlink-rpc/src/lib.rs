//! unionlink-rpc — JSON-RPC plumbing for the UnionLink scanner.
//!
//! - [`RpcTransport`] — the async trait every transport implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] — wire types
//! - [`HttpRpcClient`] — reqwest-backed transport
//! - [`EndpointPool`] / [`EndpointOrdinal`] — the ordinally-keyed endpoint list
//!   and the cyclic failover position into it

pub mod error;
pub mod http;
pub mod pool;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use pool::{Endpoint, EndpointOrdinal, EndpointPool, PoolError};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use transport::RpcTransport;
