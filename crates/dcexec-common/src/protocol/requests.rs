use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

pub type RequestId = u64;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What a worker is asked to do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Liveness check
    Hello,
    /// Store `binary` as an executable; the result is its handle
    Upload {
        #[serde(with = "base64_bytes")]
        binary: Vec<u8>,
    },
    /// Delete a previously uploaded executable
    Remove { handle: String },
    /// Run an uploaded executable, feeding `stdin`; the result is its stdout
    Execute {
        handle: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(with = "base64_bytes")]
        stdin: Vec<u8>,
    },
    /// Whether `handle` names a binary the worker still holds
    Exists { handle: String },
    /// Set `key` in the worker's key-value store
    Put { key: String, value: String },
    /// Extend the value of an existing `key`
    Append { key: String, value: String },
    Get { key: String },
    /// Write the value of `key` to a file named after the key
    StoreInTmp { key: String },
    /// Delete the file a `StoreInTmp` wrote for `key`
    DeleteInTmp { key: String },
    /// Delete every file written by `StoreInTmp`
    DeleteTmp,
}

impl Operation {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Hello => "hello",
            Operation::Upload { .. } => "upload",
            Operation::Remove { .. } => "remove",
            Operation::Execute { .. } => "execute",
            Operation::Exists { .. } => "exists",
            Operation::Put { .. } => "put",
            Operation::Append { .. } => "append",
            Operation::Get { .. } => "get",
            Operation::StoreInTmp { .. } => "store_in_tmp",
            Operation::DeleteInTmp { .. } => "delete_in_tmp",
            Operation::DeleteTmp => "delete_tmp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRequest {
    pub id: RequestId,
    #[serde(flatten)]
    pub op: Operation,
}

impl WorkerRequest {
    pub fn new(op: Operation) -> Self {
        WorkerRequest {
            id: generate_request_id(),
            op,
        }
    }
}

fn generate_request_id() -> RequestId {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    // Always increment the counter to ensure uniqueness
    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

    // Upper 32 bits from the clock, lower 32 bits from the counter
    (timestamp & 0xFFFFFFFF00000000) | (counter & 0xFFFFFFFF)
}

/// Serde adapter carrying raw bytes as a base64 string inside JSON.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
