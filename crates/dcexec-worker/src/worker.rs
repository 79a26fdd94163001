use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use dcexec_common::protocol::{Operation, ResponsePayload, WorkerRequest, WorkerResponse};
use dcexec_common::{DcexecError, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use crate::config::WorkerConfig;
use crate::store::DataStore;

/// `ETXTBSY`: a freshly written binary is still open for writing somewhere,
/// typically in a child forked by a concurrent spawn.
const TEXT_FILE_BUSY: i32 = 26;
const SPAWN_ATTEMPTS: u32 = 5;

/// Stores, runs and removes uploaded binaries, and keeps a small key-value
/// store for the programs it runs.
///
/// A worker only ever touches files it created itself: handles are the
/// paths it returned from uploads, and anything else is rejected.
pub struct Worker {
    config: WorkerConfig,
    binaries: Mutex<HashSet<PathBuf>>,
    data: DataStore,
}

impl Worker {
    /// Creates a worker, making sure the storage directory exists.
    pub fn new(config: WorkerConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.storage_dir)?;
        let data = DataStore::new(&config.storage_dir);
        Ok(Self {
            config,
            binaries: Mutex::new(HashSet::new()),
            data,
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    fn binaries(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.binaries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handles one request; failures become error responses.
    pub async fn handle_request(&self, request: WorkerRequest) -> WorkerResponse {
        let id = request.id;
        let op_name = request.op.name();
        tracing::debug!(id, "Handling {} request", op_name);

        let result = match request.op {
            Operation::Hello => Ok(ResponsePayload::Text(format!(
                "dcexec-worker {}",
                env!("CARGO_PKG_VERSION")
            ))),
            Operation::Upload { binary } => self.store(binary).await.map(ResponsePayload::Text),
            Operation::Remove { handle } => self
                .remove(&handle)
                .await
                .map(|()| ResponsePayload::Text("removed".to_string())),
            Operation::Execute { handle, args, stdin } => self
                .execute(&handle, &args, stdin)
                .await
                .map(ResponsePayload::Bytes),
            Operation::Exists { handle } => Ok(ResponsePayload::Flag(self.contains(&handle))),
            Operation::Put { key, value } => Ok(ResponsePayload::Flag(self.data.put(key, value))),
            Operation::Append { key, value } => self.data.append(&key, &value).map(ResponsePayload::Text),
            Operation::Get { key } => self.data.get(&key).map(ResponsePayload::Text),
            Operation::StoreInTmp { key } => self.data.store_file(&key).await.map(path_text),
            Operation::DeleteInTmp { key } => self.data.delete_file(&key).await.map(path_text),
            Operation::DeleteTmp => Ok(ResponsePayload::Count(self.data.delete_files().await as u64)),
        };

        match result {
            Ok(payload) => WorkerResponse::success(id, payload),
            Err(e) => {
                tracing::warn!(id, "{} failed: {}", op_name, e);
                WorkerResponse::error(id, e.to_string())
            }
        }
    }

    /// Writes `binary` to a new executable file and returns its handle.
    pub async fn store(&self, binary: Vec<u8>) -> Result<String> {
        if binary.len() > self.config.max_upload_bytes {
            return Err(DcexecError::InvalidRequest(format!(
                "binary of {} bytes exceeds the {} byte limit",
                binary.len(),
                self.config.max_upload_bytes
            )));
        }

        let dir = self.config.storage_dir.clone();
        let size = binary.len();
        // Plain blocking I/O so the file is closed before anyone can exec it
        let path = tokio::task::spawn_blocking(move || write_binary(&dir, &binary))
            .await
            .map_err(|e| DcexecError::Upload(format!("storage task failed: {}", e)))??;

        tracing::info!("Stored {} bytes as {}", size, path.display());
        let handle = path.to_string_lossy().into_owned();
        self.binaries().insert(path);
        Ok(handle)
    }

    /// Deletes a stored binary.
    pub async fn remove(&self, handle: &str) -> Result<()> {
        let path = PathBuf::from(handle);
        let known = self.binaries().remove(&path);
        if !known {
            return Err(DcexecError::InvalidRequest(format!("binary not known: {}", handle)));
        }
        tokio::fs::remove_file(&path).await?;
        tracing::info!("Removed {}", path.display());
        Ok(())
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.binaries().contains(Path::new(handle))
    }

    /// Paths of every stored binary, sorted.
    pub fn stored(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.binaries().iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Runs a stored binary with `args`, feeding it `stdin`, and returns its
    /// stdout.
    ///
    /// A non-zero exit is an [`Execution`](DcexecError::Execution) error
    /// carrying the status and stderr. A run exceeding the execution timeout
    /// is killed and reported as a [`Timeout`](DcexecError::Timeout).
    pub async fn execute(&self, handle: &str, args: &[String], stdin: Vec<u8>) -> Result<Vec<u8>> {
        let path = PathBuf::from(handle);
        let known = self.binaries().contains(&path);
        if !known {
            return Err(DcexecError::InvalidRequest(format!("binary not known: {}", handle)));
        }

        let mut child = spawn_binary(&path, args).await?;
        let feeder = child.stdin.take().map(|mut pipe| {
            tokio::spawn(async move {
                // Dropping the pipe afterwards closes the child's stdin
                pipe.write_all(&stdin).await
            })
        });

        let timeout = self.config.execution_timeout;
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output
                .map_err(|e| DcexecError::Execution(format!("waiting for {}: {}", handle, e)))?,
            Err(_) => {
                tracing::warn!("{} exceeded {:?}, killed", handle, timeout);
                return Err(DcexecError::Timeout(timeout.as_millis() as u64));
            }
        };

        if let Some(feeder) = feeder {
            match feeder.await {
                // Programs may exit without reading all of their input
                Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => {
                    tracing::debug!("Writing stdin to {} failed: {}", handle, e);
                }
                _ => {}
            }
        }

        if !output.status.success() {
            return Err(DcexecError::Execution(format!(
                "{} exited with {}: {}",
                handle,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::debug!("{} produced {} bytes", handle, output.stdout.len());
        Ok(output.stdout)
    }

    /// Deletes every stored binary and every file written from the
    /// key-value store, returning how many files were removed.
    pub async fn shutdown_cleanup(&self) -> usize {
        let paths: Vec<PathBuf> = self.binaries().drain().collect();
        let mut removed = 0;
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        removed + self.data.delete_files().await
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("config", &self.config)
            .field("stored", &self.binaries().len())
            .field("data", &self.data)
            .finish()
    }
}

fn path_text(path: PathBuf) -> ResponsePayload {
    ResponsePayload::Text(path.to_string_lossy().into_owned())
}

/// Picks a fresh `<10 random alphanumerics>_<unix seconds>` name in `dir`.
fn binary_name() -> String {
    let tag: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}_{}", tag, secs)
}

fn write_binary(dir: &Path, binary: &[u8]) -> Result<PathBuf> {
    loop {
        let path = dir.join(binary_name());
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o755);
        }

        let mut file = match options.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(DcexecError::Upload(format!("creating {}: {}", path.display(), e))),
        };
        file.write_all(binary)
            .and_then(|()| file.sync_all())
            .map_err(|e| DcexecError::Upload(format!("writing {}: {}", path.display(), e)))?;

        // The creation mode is subject to the umask
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }
        return Ok(path);
    }
}

async fn spawn_binary(path: &Path, args: &[String]) -> Result<Child> {
    let mut attempt = 1;
    loop {
        let spawned = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => return Ok(child),
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) && attempt < SPAWN_ATTEMPTS => {
                tracing::debug!("{} busy, retrying spawn", path.display());
                tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(DcexecError::Execution(format!(
                    "could not start {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}
