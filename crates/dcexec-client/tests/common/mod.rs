//! Counting stub collaborator shared by the client integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use dcexec_client::{Collaborator, HostRegistry, RemoteBuffer, RemoteString};
use dcexec_common::{DcexecError, Result};

/// Records every call, echoes stdin back as stdout, and can be told to fail
/// or to hold executions until released.
#[derive(Default)]
pub struct StubCollaborator {
    uploads: AtomicUsize,
    executes: AtomicUsize,
    removes: Mutex<Vec<(String, String)>>,
    released: Arc<AtomicUsize>,
    fail_upload: AtomicBool,
    fail_execute: AtomicBool,
    fail_remove: AtomicBool,
    upload_delay: Duration,
    gate_closed: Mutex<bool>,
    gate: Condvar,
}

impl StubCollaborator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_upload_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            upload_delay: delay,
            ..Default::default()
        })
    }

    pub fn registry(self: &Arc<Self>) -> HostRegistry {
        HostRegistry::new(self.clone())
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Executions started, including ones still held at the gate.
    pub fn execute_count(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> Vec<(String, String)> {
        self.removes.lock().unwrap().clone()
    }

    pub fn remove_count(&self) -> usize {
        self.removes.lock().unwrap().len()
    }

    /// Release hooks run so far.
    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_execute(&self, fail: bool) {
        self.fail_execute.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    /// Holds every execution until [`open_gate`](Self::open_gate).
    pub fn close_gate(&self) {
        *self.gate_closed.lock().unwrap() = true;
    }

    pub fn open_gate(&self) {
        *self.gate_closed.lock().unwrap() = false;
        self.gate.notify_all();
    }

    fn hook(&self) -> impl FnOnce() + Send + 'static {
        let released = self.released.clone();
        move || {
            released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Collaborator for StubCollaborator {
    fn upload(&self, addr: &str, binary: &[u8]) -> Result<RemoteString> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(DcexecError::Upload("injected upload failure".to_string()));
        }
        std::thread::sleep(self.upload_delay);
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = format!("{}/{}-{}", addr, n, binary.len());
        Ok(RemoteString::with_release(handle, self.hook()))
    }

    fn remove(&self, addr: &str, handle: &str) -> Result<RemoteString> {
        self.removes
            .lock()
            .unwrap()
            .push((addr.to_string(), handle.to_string()));
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(DcexecError::Removal("injected removal failure".to_string()));
        }
        Ok(RemoteString::with_release("removed", self.hook()))
    }

    fn execute(&self, _addr: &str, _handle: &str, _args: &[String], stdin: &[u8]) -> Result<RemoteBuffer> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        let mut closed = self.gate_closed.lock().unwrap();
        while *closed {
            closed = self.gate.wait(closed).unwrap();
        }
        drop(closed);

        if self.fail_execute.load(Ordering::SeqCst) {
            return Err(DcexecError::Execution("injected execution failure".to_string()));
        }
        Ok(RemoteBuffer::with_release(stdin.to_vec(), self.hook()))
    }
}

/// Writes a small fake binary into `dir`.
pub fn binary(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!fake {}", name)).unwrap();
    path
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}
