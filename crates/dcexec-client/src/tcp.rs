use dcexec_common::protocol::{Operation, ResponsePayload, WorkerResponse};
use dcexec_common::transport::TransportConfig;
use dcexec_common::{DcexecError, Result};

use crate::collaborator::Collaborator;
use crate::pool::ConnectionPool;
use crate::remote::{RemoteBuffer, RemoteString};

/// [`Collaborator`] backed by `dcexec-worker` processes reached over TCP.
#[derive(Debug)]
pub struct TcpCollaborator {
    pool: ConnectionPool,
}

impl TcpCollaborator {
    pub fn new(config: TransportConfig) -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::new(config)?,
        })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Asks the worker at `addr` to identify itself.
    pub fn hello(&self, addr: &str) -> Result<String> {
        let response = self.pool.call(addr, Operation::Hello)?;
        expect_text(response).map_err(DcexecError::InvalidResponse)
    }

    /// Whether the worker at `addr` still holds `handle`.
    pub fn exists(&self, addr: &str, handle: &str) -> Result<bool> {
        let response = self.pool.call(
            addr,
            Operation::Exists {
                handle: handle.to_string(),
            },
        )?;
        match response.into_result().map_err(DcexecError::InvalidResponse)? {
            Some(ResponsePayload::Flag(exists)) => Ok(exists),
            other => Err(DcexecError::InvalidResponse(format!(
                "expected a flag, got {:?}",
                other
            ))),
        }
    }

    /// Sets `key` on the worker at `addr`, returning whether a value was
    /// replaced.
    pub fn put(&self, addr: &str, key: &str, value: &str) -> Result<bool> {
        let op = Operation::Put {
            key: key.to_string(),
            value: value.to_string(),
        };
        match self.store_call(addr, op)? {
            Some(ResponsePayload::Flag(replaced)) => Ok(replaced),
            other => Err(unexpected(addr, "a flag", other)),
        }
    }

    /// Appends `value` to an existing key and returns the combined value.
    pub fn append(&self, addr: &str, key: &str, value: &str) -> Result<String> {
        let op = Operation::Append {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.store_text(addr, op)
    }

    pub fn get(&self, addr: &str, key: &str) -> Result<String> {
        self.store_text(addr, Operation::Get { key: key.to_string() })
    }

    /// Has the worker write the value of `key` to a file; returns its
    /// remote path.
    pub fn store_in_tmp(&self, addr: &str, key: &str) -> Result<String> {
        self.store_text(addr, Operation::StoreInTmp { key: key.to_string() })
    }

    /// Deletes the file written for `key`; returns its remote path.
    pub fn delete_in_tmp(&self, addr: &str, key: &str) -> Result<String> {
        self.store_text(addr, Operation::DeleteInTmp { key: key.to_string() })
    }

    /// Deletes every file written from the worker's store and returns how
    /// many there were.
    pub fn delete_tmp(&self, addr: &str) -> Result<u64> {
        match self.store_call(addr, Operation::DeleteTmp)? {
            Some(ResponsePayload::Count(count)) => Ok(count),
            other => Err(unexpected(addr, "a count", other)),
        }
    }

    fn store_call(&self, addr: &str, op: Operation) -> Result<Option<ResponsePayload>> {
        let response = self.pool.call(addr, op).map_err(|e| fold(DcexecError::Store, addr, e))?;
        response
            .into_result()
            .map_err(|msg| DcexecError::Store(format!("{}: {}", addr, msg)))
    }

    fn store_text(&self, addr: &str, op: Operation) -> Result<String> {
        match self.store_call(addr, op)? {
            Some(ResponsePayload::Text(text)) => Ok(text),
            other => Err(unexpected(addr, "text", other)),
        }
    }
}

impl Collaborator for TcpCollaborator {
    fn upload(&self, addr: &str, binary: &[u8]) -> Result<RemoteString> {
        let op = Operation::Upload {
            binary: binary.to_vec(),
        };
        let response = self.pool.call(addr, op).map_err(|e| fold(DcexecError::Upload, addr, e))?;
        expect_text(response)
            .map(RemoteString::new)
            .map_err(|msg| DcexecError::Upload(format!("{}: {}", addr, msg)))
    }

    fn remove(&self, addr: &str, handle: &str) -> Result<RemoteString> {
        let op = Operation::Remove {
            handle: handle.to_string(),
        };
        let response = self.pool.call(addr, op).map_err(|e| fold(DcexecError::Removal, addr, e))?;
        expect_text(response)
            .map(RemoteString::new)
            .map_err(|msg| DcexecError::Removal(format!("{}: {}", addr, msg)))
    }

    fn execute(&self, addr: &str, handle: &str, args: &[String], stdin: &[u8]) -> Result<RemoteBuffer> {
        let op = Operation::Execute {
            handle: handle.to_string(),
            args: args.to_vec(),
            stdin: stdin.to_vec(),
        };
        let response = self
            .pool
            .call(addr, op)
            .map_err(|e| fold(DcexecError::Execution, addr, e))?;
        match response.into_result() {
            Ok(Some(ResponsePayload::Bytes(stdout))) => Ok(RemoteBuffer::new(stdout)),
            Ok(other) => Err(DcexecError::Execution(format!(
                "{}: expected stdout bytes, got {:?}",
                addr, other
            ))),
            Err(msg) => Err(DcexecError::Execution(format!("{}: {}", addr, msg))),
        }
    }
}

fn expect_text(response: WorkerResponse) -> std::result::Result<String, String> {
    match response.into_result()? {
        Some(ResponsePayload::Text(text)) => Ok(text),
        other => Err(format!("expected text, got {:?}", other)),
    }
}

fn unexpected(addr: &str, wanted: &str, got: Option<ResponsePayload>) -> DcexecError {
    DcexecError::InvalidResponse(format!("{}: expected {}, got {:?}", addr, wanted, got))
}

/// Reports a transport failure as the error kind of the operation it broke.
fn fold(kind: fn(String) -> DcexecError, addr: &str, err: DcexecError) -> DcexecError {
    kind(format!("{}: {}", addr, err))
}
