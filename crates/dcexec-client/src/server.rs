use std::path::{Path, PathBuf};
use std::sync::Arc;

use dcexec_common::marshal::{self, Decode, Encode};
use dcexec_common::{DcexecError, Result};

use crate::host::HostState;
use crate::job_counter::JobGuard;
use crate::pending::PendingRun;
use crate::registry::HostRegistry;

/// A handle to one remote host.
///
/// Cheap to clone; all clones (and every other `Server` built from the same
/// registry for the same address) share one executable cache and one
/// in-flight counter. The default value is an inert handle with no address
/// whose operations fail with [`DcexecError::InvalidServer`].
#[derive(Clone, Default)]
pub struct Server {
    state: Option<Arc<HostState>>,
}

impl Server {
    pub fn new(registry: &HostRegistry, address: impl AsRef<str>) -> Self {
        Self {
            state: Some(registry.state_for(address.as_ref())),
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.state.as_deref().map(HostState::address)
    }

    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> Result<&Arc<HostState>> {
        self.state.as_ref().ok_or(DcexecError::InvalidServer)
    }

    /// Uploads `filename` to this host unless it is already cached.
    pub fn send_exec(&self, filename: impl AsRef<Path>) -> Result<()> {
        self.state()?.get_or_upload(filename.as_ref()).map(drop)
    }

    /// Uploads a fresh copy of `filename`, replacing any cached one.
    pub fn send_exec_overwrite(&self, filename: impl AsRef<Path>) -> Result<()> {
        self.state()?.force_upload(filename.as_ref()).map(drop)
    }

    /// Evicts `filename` from the cache and removes it from the host.
    ///
    /// Returns whether anything was cached; a miss makes no remote call.
    ///
    /// If a run of the executable is still in flight, the entry is evicted
    /// at once and this returns `Ok(true)`, but the remote removal waits for
    /// the last run to finish. A failure at that point cannot reach the
    /// caller and is only logged as a warning.
    pub fn remove_exec(&self, filename: impl AsRef<Path>) -> Result<bool> {
        self.state()?.remove(filename.as_ref())
    }

    pub fn contains_exec(&self, filename: impl AsRef<Path>) -> bool {
        self.state
            .as_ref()
            .map(|state| state.contains(filename.as_ref()))
            .unwrap_or(false)
    }

    pub fn cached_executables(&self) -> Vec<PathBuf> {
        self.state
            .as_ref()
            .map(|state| state.cached_paths())
            .unwrap_or_default()
    }

    /// Number of calls currently running on this host.
    pub fn num_jobs(&self) -> usize {
        self.state
            .as_ref()
            .map(|state| state.jobs().get())
            .unwrap_or(0)
    }

    /// Runs `filename` on this host with `stdin` and returns its stdout.
    pub fn run_exec(&self, filename: impl AsRef<Path>, stdin: &[u8]) -> Result<Vec<u8>> {
        self.run_exec_with_args(filename, &[], stdin)
    }

    /// Like [`run_exec`](Self::run_exec), also passing `args` as argv.
    pub fn run_exec_with_args(
        &self,
        filename: impl AsRef<Path>,
        args: &[String],
        stdin: &[u8],
    ) -> Result<Vec<u8>> {
        dispatch(self.state()?, filename.as_ref(), args, stdin, None)
    }

    /// Starts [`run_exec`](Self::run_exec) in the background.
    ///
    /// The call counts towards [`num_jobs`](Self::num_jobs) from the moment
    /// this returns.
    pub fn run_exec_async(&self, filename: impl AsRef<Path>, stdin: Vec<u8>) -> PendingRun<Vec<u8>> {
        self.run_exec_async_with_args(filename, Vec::new(), stdin)
    }

    pub fn run_exec_async_with_args(
        &self,
        filename: impl AsRef<Path>,
        args: Vec<String>,
        stdin: Vec<u8>,
    ) -> PendingRun<Vec<u8>> {
        self.spawn(filename.as_ref(), args, stdin, Ok)
    }

    /// Calls `filename` like a function: `args` are encoded onto its stdin
    /// and its stdout is decoded as `R`.
    ///
    /// A reply that does not decode as `R` is a
    /// [`Marshal`](DcexecError::Marshal) error.
    pub fn run_exec_as_function<R, A>(&self, filename: impl AsRef<Path>, args: &A) -> Result<R>
    where
        R: Decode,
        A: Encode + ?Sized,
    {
        let output = self.run_exec(filename, &marshal::to_payload(args))?;
        marshal::from_payload(&output)
    }

    /// Background form of [`run_exec_as_function`](Self::run_exec_as_function).
    ///
    /// `args` are encoded before this returns.
    pub fn run_exec_as_async_function<R, A>(&self, filename: impl AsRef<Path>, args: &A) -> PendingRun<R>
    where
        R: Decode + Send + 'static,
        A: Encode + ?Sized,
    {
        let payload = marshal::to_payload(args);
        self.spawn(filename.as_ref(), Vec::new(), payload, |output| {
            marshal::from_payload(&output)
        })
    }

    fn spawn<T, F>(&self, filename: &Path, args: Vec<String>, stdin: Vec<u8>, finish: F) -> PendingRun<T>
    where
        T: Send + 'static,
        F: FnOnce(Vec<u8>) -> Result<T> + Send + 'static,
    {
        let state = match self.state() {
            Ok(state) => state.clone(),
            Err(e) => return PendingRun::ready(Err(e)),
        };
        // Counted before the task starts so balancing sees it immediately
        let job = state.jobs().enter();
        let filename = filename.to_path_buf();
        PendingRun::spawn(move || {
            let output = dispatch(&state, &filename, &args, &stdin, Some(job))?;
            finish(output)
        })
    }
}

/// Resolves the executable, then runs it while counted as in flight.
fn dispatch(
    state: &HostState,
    filename: &Path,
    args: &[String],
    stdin: &[u8],
    job: Option<JobGuard>,
) -> Result<Vec<u8>> {
    let executable = state.get_or_upload(filename)?;
    let _job = job.unwrap_or_else(|| state.jobs().enter());

    tracing::debug!(
        "Executing {} on {} ({} stdin bytes)",
        filename.display(),
        state.address(),
        stdin.len()
    );
    let output = state
        .collaborator()
        .execute(state.address(), executable.handle(), args, stdin)?;
    Ok(output.into_bytes())
}

/// Servers are equal when they share one host state, that is the same
/// address in the same registry. Two default servers are equal.
impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        match (&self.state, &other.state) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for Server {}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address())
            .field("jobs", &self.num_jobs())
            .finish()
    }
}
