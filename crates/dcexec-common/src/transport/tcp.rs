use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::protocol::error::{DcexecError, Result};
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::transport::codec::JsonCodec;
use crate::transport::{DEFAULT_PORT, MAX_MESSAGE_SIZE};

/// Client-side transport configuration.
///
/// # Default Configuration
///
/// - `default_port`: 9010
/// - `connect_timeout`: 5 seconds
/// - `io_timeout`: 10 minutes (a read waits for the remote program to finish)
/// - `max_idle_per_host`: 4
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Port appended to addresses that do not carry one
    pub default_port: u16,
    /// Maximum time to establish a TCP connection
    pub connect_timeout: Duration,
    /// Read/write timeout on an established connection
    pub io_timeout: Duration,
    /// Idle connections kept open per host for reuse
    pub max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(10 * 60),
            max_idle_per_host: 4,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.max_idle_per_host = max_idle;
        self
    }

    /// Rejects zero timeouts and a zero default port.
    pub fn validate(&self) -> Result<()> {
        if self.default_port == 0 {
            return Err(DcexecError::Config("default port must not be 0".to_string()));
        }
        if self.connect_timeout.is_zero() || self.io_timeout.is_zero() {
            return Err(DcexecError::Config(
                "transport timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Appends `default_port` to `addr` unless it already names a port.
    ///
    /// ```
    /// use dcexec_common::transport::TransportConfig;
    ///
    /// let config = TransportConfig::default();
    /// assert_eq!(config.endpoint("10.0.0.5"), "10.0.0.5:9010");
    /// assert_eq!(config.endpoint("10.0.0.5:7000"), "10.0.0.5:7000");
    /// assert_eq!(config.endpoint("::1"), "[::1]:9010");
    /// ```
    pub fn endpoint(&self, addr: &str) -> String {
        if addr.parse::<SocketAddr>().is_ok() {
            return addr.to_string();
        }
        if let Ok(ip) = addr.parse::<IpAddr>() {
            return SocketAddr::new(ip, self.default_port).to_string();
        }
        if addr.contains(':') {
            // host:port with a DNS name
            return addr.to_string();
        }
        format!("{}:{}", addr, self.default_port)
    }
}

/// Blocking TCP transport.
///
/// Remote calls block the calling thread, so the client uses plain
/// `std::net` streams with read/write timeouts.
///
/// # Wire Protocol
///
/// ```text
/// [4-byte length] [JSON data]
/// ```
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Connects to a worker, trying every resolved address in turn.
    pub fn connect(&self, addr: &str) -> Result<TcpStream> {
        let endpoint = self.config.endpoint(addr);
        let socket_addrs = endpoint
            .to_socket_addrs()
            .map_err(|e| DcexecError::Connection(format!("Invalid address '{}': {}", endpoint, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect_timeout(&socket_addr, self.config.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(self.config.io_timeout))
                        .map_err(|e| DcexecError::Connection(format!("Failed to set read timeout: {}", e)))?;
                    stream
                        .set_write_timeout(Some(self.config.io_timeout))
                        .map_err(|e| DcexecError::Connection(format!("Failed to set write timeout: {}", e)))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(DcexecError::Connection(format!(
            "Failed to connect to {}: {}",
            endpoint,
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }

    /// Sends a request and waits for the matching response.
    pub fn send_request(&self, stream: &mut TcpStream, request: &WorkerRequest) -> Result<WorkerResponse> {
        let encoded = JsonCodec::encode_request(request)?;
        self.send_message(stream, &encoded)?;

        let response_data = self.receive_message(stream)?;
        let response = JsonCodec::decode_response(&response_data)?;

        if response.id != request.id {
            return Err(DcexecError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }
        Ok(response)
    }

    /// Sends a message with length prefix.
    pub fn send_message(&self, stream: &mut TcpStream, data: &[u8]) -> Result<()> {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(DcexecError::InvalidRequest(format!(
                "Message too large: {} bytes (max {} bytes)",
                data.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        let len = data.len() as u32;

        stream
            .write_all(&len.to_be_bytes())
            .map_err(|e| self.map_io_error(e, "writing length prefix"))?;
        stream
            .write_all(data)
            .map_err(|e| self.map_io_error(e, "writing data"))?;
        stream
            .flush()
            .map_err(|e| self.map_io_error(e, "flushing stream"))?;

        Ok(())
    }

    /// Receives a message with length prefix.
    pub fn receive_message(&self, stream: &mut TcpStream) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .map_err(|e| self.map_io_error(e, "reading length prefix"))?;

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(DcexecError::InvalidResponse(format!(
                "Message too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .map_err(|e| self.map_io_error(e, "reading data"))?;

        Ok(buf)
    }

    /// Map IO errors to appropriate DcexecError variants
    ///
    /// - Timeouts/would block -> `Timeout`
    /// - Connection errors -> `Connection`
    /// - Other IO errors -> `Io`
    fn map_io_error(&self, err: std::io::Error, context: &str) -> DcexecError {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                DcexecError::Timeout(self.config.io_timeout.as_millis() as u64)
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => {
                DcexecError::Connection(format!("{}: Connection lost", context))
            }
            _ => DcexecError::Io(err),
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }
}
