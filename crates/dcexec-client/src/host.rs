use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dcexec_common::Result;

use crate::collaborator::Collaborator;
use crate::executable::Executable;
use crate::job_counter::JobCounter;

/// Shared per-host state: the executable cache and the in-flight counter.
///
/// Every [`Server`](crate::Server) for the same address holds the same
/// `Arc<HostState>`. When the last one is dropped, so is the state, and every
/// cached executable is removed from the host.
pub struct HostState {
    address: String,
    collaborator: Arc<dyn Collaborator>,
    executables: Mutex<HashMap<PathBuf, Arc<Executable>>>,
    jobs: JobCounter,
}

impl HostState {
    pub(crate) fn new(address: String, collaborator: Arc<dyn Collaborator>) -> Self {
        Self {
            address,
            collaborator,
            executables: Mutex::new(HashMap::new()),
            jobs: JobCounter::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn collaborator(&self) -> &Arc<dyn Collaborator> {
        &self.collaborator
    }

    pub fn jobs(&self) -> &JobCounter {
        &self.jobs
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<Executable>>> {
        // Every mutation is a single insert or remove, so a poisoned map is
        // still consistent.
        self.executables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached executable for `path`, uploading it first on a miss.
    ///
    /// The upload happens while the cache is locked, so concurrent callers
    /// asking for the same new file upload it once; the others wait and then
    /// find it cached. On failure the cache is left untouched.
    pub fn get_or_upload(&self, path: &Path) -> Result<Arc<Executable>> {
        let mut cache = self.cache();
        if let Some(executable) = cache.get(path) {
            tracing::debug!("Cache hit for {} on {}", path.display(), self.address);
            return Ok(executable.clone());
        }

        tracing::debug!("Cache miss for {} on {}", path.display(), self.address);
        let executable = Arc::new(Executable::upload(self.collaborator.clone(), &self.address, path)?);
        cache.insert(path.to_path_buf(), executable.clone());
        Ok(executable)
    }

    /// Uploads a fresh copy of `path` whether or not one is cached.
    ///
    /// The replaced copy is removed from the host once nothing uses it any
    /// more.
    pub fn force_upload(&self, path: &Path) -> Result<Arc<Executable>> {
        let (executable, replaced) = {
            let mut cache = self.cache();
            let executable = Arc::new(Executable::upload(self.collaborator.clone(), &self.address, path)?);
            let replaced = cache.insert(path.to_path_buf(), executable.clone());
            (executable, replaced)
        };
        // The old copy is removed here, outside the lock
        drop(replaced);
        Ok(executable)
    }

    /// Evicts `path` and removes it from the host.
    ///
    /// Returns `Ok(false)` without contacting the host when nothing was
    /// cached. If a call still holds the executable, its removal is left to
    /// that call's end and this returns `Ok(true)` immediately.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        let evicted = self.cache().remove(path);
        match evicted {
            None => Ok(false),
            Some(executable) => match Arc::try_unwrap(executable) {
                Ok(executable) => executable.remove().map(|()| true),
                Err(_in_use) => Ok(true),
            },
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.cache().contains_key(path)
    }

    pub fn cached(&self, path: &Path) -> Option<Arc<Executable>> {
        self.cache().get(path).cloned()
    }

    /// Paths of every cached executable, sorted.
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.cache().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl std::fmt::Debug for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostState")
            .field("address", &self.address)
            .field("cached", &self.cache().len())
            .field("in_flight", &self.jobs.get())
            .finish()
    }
}

impl Drop for HostState {
    fn drop(&mut self) {
        let executables = std::mem::take(
            self.executables
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if !executables.is_empty() {
            tracing::info!(
                "Last handle to {} dropped, removing {} executables",
                self.address,
                executables.len()
            );
        }
        drop(executables);
    }
}
