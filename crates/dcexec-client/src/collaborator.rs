use dcexec_common::Result;

use crate::remote::{RemoteBuffer, RemoteString};

/// The remote side of executable management: something that can store a
/// binary on a host, run it, and delete it again.
///
/// [`TcpCollaborator`](crate::TcpCollaborator) talks to a `dcexec-worker`;
/// tests plug in stubs. Implementations report failures as
/// [`Upload`](dcexec_common::DcexecError::Upload),
/// [`Execution`](dcexec_common::DcexecError::Execution) and
/// [`Removal`](dcexec_common::DcexecError::Removal) errors respectively.
pub trait Collaborator: Send + Sync {
    /// Stores `binary` as an executable on `addr` and returns its handle.
    fn upload(&self, addr: &str, binary: &[u8]) -> Result<RemoteString>;

    /// Deletes the executable `handle` from `addr`.
    fn remove(&self, addr: &str, handle: &str) -> Result<RemoteString>;

    /// Runs `handle` on `addr` with `args`, feeding `stdin`, and returns its
    /// stdout.
    fn execute(&self, addr: &str, handle: &str, args: &[String], stdin: &[u8]) -> Result<RemoteBuffer>;
}
