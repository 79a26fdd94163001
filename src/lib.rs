//! dcexec
//!
//! Upload a local binary to remote workers once, then run it there many
//! times with different stdin, spreading the calls over the workers.
//!
//! This crate re-exports the pieces most programs need:
//!
//! - [`client`]: [`Server`], [`Client`] and the [`TcpCollaborator`] that
//!   talks to workers
//! - [`worker`]: the remote side, [`WorkerServer`]
//! - [`common`]: the shared error type, wire protocol and argument codec
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dcexec::{BalancePolicy, Client, HostRegistry, TcpCollaborator, TransportConfig};
//!
//! let collaborator = Arc::new(TcpCollaborator::new(TransportConfig::default())?);
//! let registry = HostRegistry::new(collaborator);
//! let client = Client::from_addresses(&registry, ["10.0.0.1", "10.0.0.2"], BalancePolicy::RoundRobin)?;
//!
//! let words: Vec<String> = client.run_as_function("./split", "one two three")?;
//! # Ok::<(), dcexec::DcexecError>(())
//! ```

pub use dcexec_client as client;
pub use dcexec_common as common;
pub use dcexec_worker as worker;

pub use dcexec_client::{BalancePolicy, Client, Collaborator, HostRegistry, PendingRun, Server, TcpCollaborator};
pub use dcexec_common::marshal::{Decode, Encode};
pub use dcexec_common::transport::TransportConfig;
pub use dcexec_common::{DcexecError, Result};
pub use dcexec_worker::{WorkerConfig, WorkerServer};
