use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dcexec_common::{DcexecError, FileErrorKind, Result};

use crate::collaborator::Collaborator;

/// Reads a local binary, distinguishing open, size and read failures.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| DcexecError::file(FileErrorKind::Open, path, e))?;
    let size = file
        .metadata()
        .map_err(|e| DcexecError::file(FileErrorKind::Metadata, path, e))?
        .len();

    let mut bytes = Vec::with_capacity(capacity_hint(size));
    file.read_to_end(&mut bytes)
        .map_err(|e| DcexecError::file(FileErrorKind::Read, path, e))?;
    Ok(bytes)
}

/// Preallocation for a file of `len` bytes. Only a hint: the file may change
/// size while it is read, and lengths that do not fit `usize` get none.
fn capacity_hint(len: u64) -> usize {
    usize::try_from(len).unwrap_or(0)
}

/// One binary uploaded to one host.
///
/// The executable owns its remote handle: dropping it removes the binary
/// from the host, at most once. Moving it moves that obligation, and it
/// cannot be cloned. Share it through an `Arc` instead, in which case the
/// removal happens when the last reference goes away.
pub struct Executable {
    host: String,
    path: PathBuf,
    handle: String,
    valid: bool,
    collaborator: Arc<dyn Collaborator>,
}

impl Executable {
    /// Reads `path` and uploads it to `host`.
    pub fn upload(collaborator: Arc<dyn Collaborator>, host: &str, path: &Path) -> Result<Self> {
        let bytes = read_file(path)?;
        let handle = collaborator.upload(host, &bytes)?.into_string();

        tracing::info!(
            "Uploaded {} ({} bytes) to {} as {}",
            path.display(),
            bytes.len(),
            host,
            handle
        );

        Ok(Self {
            host: host.to_string(),
            path: path.to_path_buf(),
            handle,
            valid: true,
            collaborator,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opaque identifier the host knows this binary by.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Removes the binary from its host now, reporting failure.
    ///
    /// Whatever the outcome, the executable is no longer valid afterwards and
    /// its drop does nothing.
    pub fn remove(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if !self.valid {
            return Ok(());
        }
        self.valid = false;
        self.collaborator.remove(&self.host, &self.handle)?;
        tracing::info!("Removed {} from {}", self.path.display(), self.host);
        Ok(())
    }
}

impl std::fmt::Debug for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executable")
            .field("host", &self.host)
            .field("path", &self.path)
            .field("handle", &self.handle)
            .field("valid", &self.valid)
            .finish()
    }
}

impl Drop for Executable {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(
                "Failed to remove {} ({}) from {}: {}",
                self.path.display(),
                self.handle,
                self.host,
                e
            );
        }
    }
}
