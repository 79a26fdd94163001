use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::protocol::error::{DcexecError, Result};
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::transport::codec::JsonCodec;
use crate::transport::MAX_MESSAGE_SIZE;

/// Async TCP server for workers.
///
/// Each accepted connection is served on its own task and may carry any
/// number of requests until the peer closes it.
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Creates a new TCP server bound to the specified address.
    ///
    /// # Arguments
    /// * `bind_addr` - The address to bind to (e.g., "0.0.0.0:9010")
    pub async fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| DcexecError::Connection(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        Ok(Self { listener })
    }

    /// Gets the actual bound address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| DcexecError::Connection(format!("Failed to get local addr: {}", e)))
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn run_until<F, Fut, S>(&self, handler: F, shutdown: S) -> Result<()>
    where
        F: Fn(WorkerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkerResponse> + Send + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer_addr) = accepted
                .map_err(|e| DcexecError::Connection(format!("Failed to accept connection: {}", e)))?;
            tracing::debug!(%peer_addr, "Connection established");

            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, handler).await {
                    tracing::warn!(%peer_addr, "Connection error: {}", e);
                }
            });
        }
    }

    /// Accepts connections forever.
    pub async fn run_with_handler<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(WorkerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkerResponse> + Send + 'static,
    {
        self.run_until(handler, std::future::pending()).await
    }
}

/// Serves requests on one connection until the peer closes it.
async fn handle_connection<F, Fut>(mut stream: TcpStream, handler: Arc<F>) -> Result<()>
where
    F: Fn(WorkerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkerResponse> + Send + 'static,
{
    loop {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::debug!("Connection closed by peer");
                return Ok(());
            }
            Err(e) => {
                return Err(DcexecError::Connection(format!("Failed to read length: {}", e)));
            }
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(DcexecError::InvalidRequest(format!(
                "Message too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| DcexecError::Connection(format!("Failed to read data: {}", e)))?;

        let request = match JsonCodec::decode_request(&buf) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!("Failed to decode request: {}", e);
                send_response(&mut stream, &WorkerResponse::error(0, e.to_string())).await?;
                continue;
            }
        };

        let response = handler(request).await;
        send_response(&mut stream, &response).await?;
    }
}

async fn send_response(stream: &mut TcpStream, response: &WorkerResponse) -> Result<()> {
    let encoded = JsonCodec::encode_response(response)?;

    let len = encoded.len() as u32;
    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| DcexecError::Connection(format!("Failed to send response length: {}", e)))?;
    stream
        .write_all(&encoded)
        .await
        .map_err(|e| DcexecError::Connection(format!("Failed to send response data: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| DcexecError::Connection(format!("Failed to flush response: {}", e)))?;

    Ok(())
}
