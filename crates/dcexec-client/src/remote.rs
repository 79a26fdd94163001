//! Owned results handed back by a [`Collaborator`](crate::Collaborator).
//!
//! A collaborator may hand out memory it allocated itself and want it back
//! exactly once. Each wrapper carries an optional release hook that runs when
//! the wrapper is dropped, whether the caller consumed the value or bailed
//! out on an error path.

use std::fmt;
use std::ops::Deref;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A string returned by a collaborator: an upload handle or an
/// acknowledgement.
pub struct RemoteString {
    value: String,
    release: Option<ReleaseHook>,
}

impl RemoteString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            release: None,
        }
    }

    /// Wraps `value` and runs `release` once when the wrapper goes away.
    pub fn with_release<F>(value: impl Into<String>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            value: value.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Takes the string out; the release hook still runs exactly once.
    pub fn into_string(mut self) -> String {
        std::mem::take(&mut self.value)
    }
}

impl Deref for RemoteString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for RemoteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteString")
            .field("value", &self.value)
            .field("release", &self.release.is_some())
            .finish()
    }
}

impl Drop for RemoteString {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Captured stdout returned by a collaborator's execute operation.
pub struct RemoteBuffer {
    data: Vec<u8>,
    release: Option<ReleaseHook>,
}

impl RemoteBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            release: None,
        }
    }

    pub fn with_release<F>(data: Vec<u8>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            data,
            release: Some(Box::new(release)),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Takes the bytes out; the release hook still runs exactly once.
    pub fn into_bytes(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl Deref for RemoteBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for RemoteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBuffer")
            .field("len", &self.data.len())
            .field("release", &self.release.is_some())
            .finish()
    }
}

impl Drop for RemoteBuffer {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
