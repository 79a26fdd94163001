use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use dcexec_common::protocol::WorkerRequest;
use dcexec_common::transport::TcpServer;
use dcexec_common::Result;

use crate::config::WorkerConfig;
use crate::worker::Worker;

/// A [`Worker`] listening for requests over TCP.
pub struct WorkerServer {
    worker: Arc<Worker>,
    server: TcpServer,
}

impl WorkerServer {
    pub async fn bind(addr: &str, config: WorkerConfig) -> Result<Self> {
        let worker = Arc::new(Worker::new(config)?);
        let server = TcpServer::new(addr).await?;
        tracing::info!(
            "Worker listening on {} (storing binaries in {})",
            server.local_addr()?,
            worker.config().storage_dir.display()
        );
        Ok(Self { worker, server })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    /// Serves until Ctrl-C, or on unix also SIGTERM or SIGQUIT.
    pub async fn run(self) -> Result<()> {
        self.run_until(termination()).await
    }

    /// Serves until `shutdown` resolves, then deletes every stored binary.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let worker = self.worker.clone();
        let result = self
            .server
            .run_until(
                move |request: WorkerRequest| {
                    let worker = worker.clone();
                    async move { worker.handle_request(request).await }
                },
                shutdown,
            )
            .await;

        let removed = self.worker.shutdown_cleanup().await;
        tracing::info!("Worker stopped, removed {} stored files", removed);
        result
    }
}

/// Resolves on the first signal asking the process to stop.
async fn termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;

        tokio::select! {
            _ = ctrl_c => {}
            _ = unix_signal(SignalKind::terminate(), "SIGTERM") => {}
            _ = unix_signal(SignalKind::quit(), "SIGQUIT") => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind, name: &str) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut signals) => {
            signals.recv().await;
            tracing::info!("Received {}", name);
        }
        Err(e) => {
            tracing::warn!("Could not listen for {}: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}
