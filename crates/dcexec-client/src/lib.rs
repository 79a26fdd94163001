//! dcexec Client
//!
//! Runs local binaries on remote workers. A binary is uploaded to a host the
//! first time it is needed and cached there until the last [`Server`] handle
//! for that host goes away; calls feed it stdin and collect its stdout.
//!
//! - [`HostRegistry`] hands out the shared per-host state
//! - [`Server`] runs executables on one host
//! - [`Client`] spreads calls over many hosts using a [`BalancePolicy`]
//! - [`Collaborator`] is the seam to whatever actually stores and runs the
//!   binaries; [`TcpCollaborator`] talks to `dcexec-worker`

pub mod balancer;
pub mod client;
pub mod collaborator;
pub mod executable;
pub mod host;
pub mod job_counter;
pub mod pending;
pub mod pool;
pub mod registry;
pub mod remote;
pub mod server;
pub mod tcp;

pub use balancer::{BalancePolicy, Balancer};
pub use client::Client;
pub use collaborator::Collaborator;
pub use executable::{read_file, Executable};
pub use host::HostState;
pub use job_counter::{JobCounter, JobGuard};
pub use pending::PendingRun;
pub use pool::ConnectionPool;
pub use registry::HostRegistry;
pub use remote::{RemoteBuffer, RemoteString};
pub use server::Server;
pub use tcp::TcpCollaborator;
