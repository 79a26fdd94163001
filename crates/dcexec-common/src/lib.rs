//! dcexec Common Types, Transport and Argument Codec
//!
//! This crate provides the pieces shared by the dcexec client and worker:
//!
//! - **Protocol Layer**: worker requests/responses and the crate-wide error type
//! - **Transport Layer**: length-prefixed JSON frames over TCP
//! - **Marshal Layer**: the typed argument codec used to turn call arguments
//!   into a stdin payload and a program's stdout back into a typed value
//!
//! # Architecture
//!
//! The worker wire protocol is deliberately small:
//! - **Transport**: TCP, many requests per connection
//! - **Serialization**: JSON, byte payloads base64-encoded
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 100 MB
//!
//! # Example
//!
//! ```
//! use dcexec_common::marshal;
//!
//! let payload = marshal::to_payload(&(7u32, String::from("hi"), vec![1.5f64, 2.0]));
//! let back: (u32, String, Vec<f64>) = marshal::from_payload(&payload).unwrap();
//! assert_eq!(back, (7, "hi".to_string(), vec![1.5, 2.0]));
//! ```

pub mod marshal;
pub mod protocol;
pub mod transport;

pub use marshal::{Decode, Decoder, Encode, Encoder, Marshal};
pub use protocol::*;
