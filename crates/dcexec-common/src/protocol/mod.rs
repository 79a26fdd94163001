pub mod error;
pub mod requests;
pub mod responses;

#[cfg(test)]
mod tests;

pub use error::{DcexecError, FileErrorKind, Result};
pub use requests::{Operation, RequestId, WorkerRequest};
pub use responses::{ResponsePayload, WorkerResponse};
