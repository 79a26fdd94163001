//! dcexec Transport Layer
//!
//! This module provides the TCP transport and codec used between clients and
//! workers.
//!
//! # Architecture
//!
//! - **Codec**: JSON serialization of [`WorkerRequest`](crate::protocol::WorkerRequest)
//!   and [`WorkerResponse`](crate::protocol::WorkerResponse)
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//!
//! # Components
//!
//! - **[`JsonCodec`]**: Encode/decode protocol messages to JSON
//! - **[`TcpTransport`]**: Blocking TCP transport (used by the client, whose
//!   remote calls block the calling thread)
//! - **[`TcpServer`]**: Async TCP server (used by workers)
//!
//! # Message Size Limits
//!
//! Both sides enforce a maximum message size of 100 MB.

pub mod codec;
pub mod tcp;
pub mod tcp_server;

pub use codec::JsonCodec;
pub use tcp::{TcpTransport, TransportConfig};
pub use tcp_server::TcpServer;

/// Maximum frame size accepted by either side (100 MB)
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Port workers listen on when an address does not name one.
pub const DEFAULT_PORT: u16 = 9010;

#[cfg(test)]
mod tests;
