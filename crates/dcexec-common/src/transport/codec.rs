use crate::protocol::error::Result;
use crate::protocol::{WorkerRequest, WorkerResponse};

/// JSON codec for worker messages.
///
/// # Example
///
/// ```
/// use dcexec_common::transport::JsonCodec;
/// use dcexec_common::protocol::{Operation, WorkerRequest};
///
/// let request = WorkerRequest::new(Operation::Hello);
/// let encoded = JsonCodec::encode_request(&request).unwrap();
/// let decoded = JsonCodec::decode_request(&encoded).unwrap();
/// assert_eq!(request, decoded);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_request(request: &WorkerRequest) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    pub fn decode_request(data: &[u8]) -> Result<WorkerRequest> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode_response(response: &WorkerResponse) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    pub fn decode_response(data: &[u8]) -> Result<WorkerResponse> {
        Ok(serde_json::from_slice(data)?)
    }
}
