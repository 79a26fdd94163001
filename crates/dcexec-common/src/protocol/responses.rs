//! Worker Response Types

use serde::{Deserialize, Serialize};

use super::requests::base64_bytes;
use super::RequestId;

/// Result value carried by a successful response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Handles and acknowledgements
    Text(String),
    /// Captured stdout
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    /// Answers to yes/no questions such as `Exists`
    Flag(bool),
    /// How many items an operation affected
    Count(u64),
}

/// A response returned from a worker to the client.
///
/// # Fields
///
/// - `id`: The request ID this response corresponds to
/// - `result`: The result value (present on success)
/// - `error`: Error message (present on failure)
/// - `success`: Whether the request succeeded
///
/// # Example
///
/// ```
/// use dcexec_common::protocol::{ResponsePayload, WorkerResponse};
///
/// let ok = WorkerResponse::success(7, ResponsePayload::Text("/tmp/abc".into()));
/// let failed = WorkerResponse::error(7, "binary not known");
/// assert!(ok.success && !failed.success);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerResponse {
    pub id: RequestId,
    pub result: Option<ResponsePayload>,
    pub error: Option<String>,
    pub success: bool,
}

impl WorkerResponse {
    pub fn success(id: RequestId, result: ResponsePayload) -> Self {
        WorkerResponse {
            id,
            result: Some(result),
            error: None,
            success: true,
        }
    }

    pub fn error(id: RequestId, error: impl Into<String>) -> Self {
        WorkerResponse {
            id,
            result: None,
            error: Some(error.into()),
            success: false,
        }
    }

    /// Splits the response into its payload or the worker's error message.
    pub fn into_result(self) -> std::result::Result<Option<ResponsePayload>, String> {
        if self.success {
            Ok(self.result)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}
