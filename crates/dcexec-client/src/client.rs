use std::path::Path;

use dcexec_common::marshal::{Decode, Encode};
use dcexec_common::{DcexecError, Result};

use crate::balancer::{BalancePolicy, Balancer};
use crate::pending::PendingRun;
use crate::registry::HostRegistry;
use crate::server::Server;

/// Dispatches calls over a fixed set of servers.
///
/// A client may be built with no servers at all; every dispatch on it then
/// fails with [`DcexecError::EmptyClient`]. Selection never waits for calls
/// in progress, so several threads can dispatch through one client at once.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use dcexec_client::{BalancePolicy, Client, HostRegistry, TcpCollaborator};
/// use dcexec_common::transport::TransportConfig;
///
/// let collaborator = Arc::new(TcpCollaborator::new(TransportConfig::default())?);
/// let registry = HostRegistry::new(collaborator);
/// let client = Client::from_addresses(
///     &registry,
///     ["10.0.0.1", "10.0.0.2"],
///     BalancePolicy::LeastConnections,
/// )?;
///
/// let sum: i64 = client.run_as_function("./sum", &vec![1i64, 2, 3])?;
/// # Ok::<(), dcexec_common::DcexecError>(())
/// ```
#[derive(Debug)]
pub struct Client {
    servers: Vec<Server>,
    policy: BalancePolicy,
    balancer: Balancer,
}

impl Client {
    /// Round-robin client over `servers`.
    pub fn new(servers: Vec<Server>) -> Self {
        Self {
            balancer: Balancer::round_robin(servers.len()),
            servers,
            policy: BalancePolicy::RoundRobin,
        }
    }

    pub fn with_policy(servers: Vec<Server>, policy: BalancePolicy) -> Result<Self> {
        let balancer = Balancer::new(&policy, servers.len())?;
        Ok(Self {
            servers,
            policy,
            balancer,
        })
    }

    /// Weighted round-robin client; `weights[i]` belongs to `servers[i]`.
    pub fn with_weights(servers: Vec<Server>, weights: Vec<u32>) -> Result<Self> {
        Self::with_policy(servers, BalancePolicy::WeightedRoundRobin(weights))
    }

    /// Builds one [`Server`] per address from `registry`.
    pub fn from_addresses<I, S>(registry: &HostRegistry, addresses: I, policy: BalancePolicy) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let servers = addresses
            .into_iter()
            .map(|address| Server::new(registry, address))
            .collect();
        Self::with_policy(servers, policy)
    }

    pub fn policy(&self) -> &BalancePolicy {
        &self.policy
    }

    pub fn num_machines(&self) -> usize {
        self.servers.len()
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn get_machine(&self, index: usize) -> Result<&Server> {
        if self.servers.is_empty() {
            return Err(DcexecError::EmptyClient);
        }
        self.servers.get(index).ok_or(DcexecError::Index {
            index,
            len: self.servers.len(),
        })
    }

    /// The server the policy picks for the next call.
    pub fn next_server(&self) -> Result<Server> {
        let index = self
            .balancer
            .pick(|i| self.servers[i].num_jobs())
            .ok_or(DcexecError::EmptyClient)?;
        let server = &self.servers[index];
        tracing::debug!(
            "Policy {} picked server {} ({:?})",
            self.policy,
            index,
            server.address()
        );
        Ok(server.clone())
    }

    /// Runs `filename` with `stdin` on the next server and waits for its
    /// stdout.
    pub fn run(&self, filename: impl AsRef<Path>, stdin: &[u8]) -> Result<Vec<u8>> {
        self.next_server()?.run_exec(filename, stdin)
    }

    pub fn run_with_args(&self, filename: impl AsRef<Path>, args: &[String], stdin: &[u8]) -> Result<Vec<u8>> {
        self.next_server()?.run_exec_with_args(filename, args, stdin)
    }

    /// Picks a server now and runs `filename` there in the background.
    pub fn distribute_and_run(&self, filename: impl AsRef<Path>, stdin: Vec<u8>) -> PendingRun<Vec<u8>> {
        self.distribute_with_args(filename, Vec::new(), stdin)
    }

    pub fn distribute_with_args(
        &self,
        filename: impl AsRef<Path>,
        args: Vec<String>,
        stdin: Vec<u8>,
    ) -> PendingRun<Vec<u8>> {
        match self.next_server() {
            Ok(server) => server.run_exec_async_with_args(filename, args, stdin),
            Err(e) => PendingRun::ready(Err(e)),
        }
    }

    pub fn run_as_function<R, A>(&self, filename: impl AsRef<Path>, args: &A) -> Result<R>
    where
        R: Decode,
        A: Encode + ?Sized,
    {
        self.next_server()?.run_exec_as_function(filename, args)
    }

    pub fn distribute_as_function<R, A>(&self, filename: impl AsRef<Path>, args: &A) -> PendingRun<R>
    where
        R: Decode + Send + 'static,
        A: Encode + ?Sized,
    {
        match self.next_server() {
            Ok(server) => server.run_exec_as_async_function(filename, args),
            Err(e) => PendingRun::ready(Err(e)),
        }
    }
}
