use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dcexec_common::protocol::{Operation, WorkerRequest, WorkerResponse};
use dcexec_common::transport::{TcpTransport, TransportConfig};
use dcexec_common::Result;

/// Blocking connection pool keyed by worker address.
///
/// Connections are checked out for the duration of one request and put back
/// afterwards, so concurrent calls to the same host each get their own
/// stream. At most `max_idle_per_host` idle connections are kept per host;
/// extra ones are closed on release.
///
/// # Example
///
/// ```rust,no_run
/// use dcexec_client::ConnectionPool;
/// use dcexec_common::protocol::Operation;
/// use dcexec_common::transport::TransportConfig;
///
/// let pool = ConnectionPool::new(TransportConfig::default())?;
/// let response = pool.call("127.0.0.1:9010", Operation::Hello)?;
/// assert!(response.success);
/// # Ok::<(), dcexec_common::DcexecError>(())
/// ```
pub struct ConnectionPool {
    transport: TcpTransport,
    idle: Mutex<HashMap<String, Vec<TcpStream>>>,
}

impl ConnectionPool {
    pub fn new(config: TransportConfig) -> Result<Self> {
        Ok(Self {
            transport: TcpTransport::new(config)?,
            idle: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        self.transport.config()
    }

    fn idle_map(&self) -> MutexGuard<'_, HashMap<String, Vec<TcpStream>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a live idle connection to `addr` or opens a new one.
    ///
    /// Idle connections the worker has closed in the meantime are discarded
    /// here, before any request is written to them. The flag tells whether
    /// the connection was reused.
    pub fn acquire(&self, addr: &str) -> Result<(TcpStream, bool)> {
        loop {
            // LIFO: the most recently used stream is the least likely to be stale
            let idle = self.idle_map().get_mut(addr).and_then(Vec::pop);
            match idle {
                Some(stream) if is_open(&stream) => return Ok((stream, true)),
                Some(_) => tracing::debug!("Dropping stale pooled connection to {}", addr),
                None => return Ok((self.transport.connect(addr)?, false)),
            }
        }
    }

    /// Returns a healthy connection for reuse.
    pub fn release(&self, addr: &str, stream: TcpStream) {
        let max_idle = self.transport.config().max_idle_per_host;
        let mut idle = self.idle_map();
        let streams = idle.entry(addr.to_string()).or_default();
        if streams.len() < max_idle {
            streams.push(stream);
        }
    }

    pub fn idle_count(&self, addr: &str) -> usize {
        self.idle_map().get(addr).map(Vec::len).unwrap_or(0)
    }

    /// Sends `op` to the worker at `addr` and returns its response.
    ///
    /// A request is written at most once. Once it may have reached the
    /// worker, a failure is returned as is, since the worker may already
    /// have acted on it. A connection that saw any error is not returned to
    /// the pool.
    pub fn call(&self, addr: &str, op: Operation) -> Result<WorkerResponse> {
        let request = WorkerRequest::new(op);
        let (mut stream, _) = self.acquire(addr)?;
        let response = self.transport.send_request(&mut stream, &request)?;
        self.release(addr, stream);
        Ok(response)
    }
}

/// Whether an idle connection is still usable.
///
/// An idle worker connection has nothing to read, so a non-blocking peek
/// would block. End of stream means the worker closed it, and unsolicited
/// bytes or errors leave it in an unknown state.
fn is_open(stream: &TcpStream) -> bool {
    if stream.set_nonblocking(true).is_err() {
        return false;
    }
    let mut byte = [0u8; 1];
    let open = matches!(stream.peek(&mut byte), Err(e) if e.kind() == ErrorKind::WouldBlock);
    stream.set_nonblocking(false).is_ok() && open
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let idle: usize = self.idle_map().values().map(Vec::len).sum();
        f.debug_struct("ConnectionPool")
            .field("config", self.transport.config())
            .field("idle", &idle)
            .finish()
    }
}
