use std::path::PathBuf;

use thiserror::Error;

/// Which step of reading a local binary failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    /// The file could not be opened
    Open,
    /// The file size could not be determined
    Metadata,
    /// Reading the contents failed part way
    Read,
}

impl std::fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            FileErrorKind::Open => "could not open",
            FileErrorKind::Metadata => "could not determine the size of",
            FileErrorKind::Read => "error reading",
        };
        f.write_str(step)
    }
}

#[derive(Error, Debug)]
pub enum DcexecError {
    #[error("{kind} file {}: {source}", path.display())]
    File {
        kind: FileErrorKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Removal failed: {0}")]
    Removal(String),

    #[error("Key-value store error: {0}")]
    Store(String),

    #[error("Marshal error: {0}")]
    Marshal(String),

    #[error("Operation attempted on an empty server handle")]
    InvalidServer,

    #[error("Client has no servers")]
    EmptyClient,

    #[error("Server index {index} out of range (client has {len})")]
    Index { index: usize, len: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DcexecError {
    pub fn file(kind: FileErrorKind, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DcexecError::File {
            kind,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure came from the network, the worker or the local
    /// filesystem rather than from misuse of the API or a marshaling mismatch.
    pub fn is_infrastructure(&self) -> bool {
        !matches!(
            self,
            DcexecError::Marshal(_)
                | DcexecError::InvalidServer
                | DcexecError::EmptyClient
                | DcexecError::Index { .. }
                | DcexecError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DcexecError>;
