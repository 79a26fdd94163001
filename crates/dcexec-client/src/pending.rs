use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use dcexec_common::{DcexecError, Result};
use tokio::sync::oneshot;

/// The eventual result of a call dispatched in the background.
///
/// Await it from async code or call [`wait`](Self::wait) from a plain
/// thread. A failed call surfaces its error here; so does a background task
/// that died without reporting.
#[must_use = "the result of the remote call is lost if this is dropped"]
#[derive(Debug)]
pub struct PendingRun<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> PendingRun<T> {
    /// Runs `job` off the caller's thread: on tokio's blocking pool when a
    /// runtime is available, on a fresh thread otherwise.
    pub(crate) fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = move || {
            // The receiver may already be gone; nothing to report to then
            let _ = tx.send(job());
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(task);
            }
            Err(_) => {
                if let Err(e) = std::thread::Builder::new()
                    .name("dcexec-dispatch".to_string())
                    .spawn(task)
                {
                    tracing::warn!("Failed to spawn dispatch thread: {}", e);
                }
            }
        }

        Self { rx }
    }
}

impl<T> PendingRun<T> {
    /// A run that has already finished.
    pub(crate) fn ready(result: Result<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Blocks the current thread until the call finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async runtime; `.await` it there.
    pub fn wait(self) -> Result<T> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(lost()))
    }
}

impl<T> Future for PendingRun<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(lost())))
    }
}

fn lost() -> DcexecError {
    DcexecError::Execution("dispatch task ended without a result".to_string())
}
