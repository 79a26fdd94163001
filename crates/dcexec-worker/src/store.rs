use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dcexec_common::{DcexecError, Result};
use tokio::io::AsyncWriteExt;

/// String values clients park on a worker, plus the files written from them.
///
/// Files land in the worker's storage directory under the key's name. Like
/// uploaded binaries, only files this store created are ever overwritten or
/// deleted.
pub struct DataStore {
    dir: PathBuf,
    values: Mutex<HashMap<String, String>>,
    // Held across file I/O so writes and deletes of one key cannot interleave
    files: tokio::sync::Mutex<HashMap<String, PathBuf>>,
}

impl DataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            values: Mutex::new(HashMap::new()),
            files: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets `key`, returning whether an existing value was replaced.
    pub fn put(&self, key: String, value: String) -> bool {
        self.values().insert(key, value).is_some()
    }

    /// Appends `value` to an existing key and returns the combined value.
    pub fn append(&self, key: &str, value: &str) -> Result<String> {
        let mut values = self.values();
        let current = values.get_mut(key).ok_or_else(|| unknown_key(key))?;
        current.push_str(value);
        Ok(current.clone())
    }

    pub fn get(&self, key: &str) -> Result<String> {
        self.values().get(key).cloned().ok_or_else(|| unknown_key(key))
    }

    /// Writes the value of `key` to `<dir>/<key>` and returns the path.
    ///
    /// Storing the same key again rewrites its file with the current value.
    pub async fn store_file(&self, key: &str) -> Result<PathBuf> {
        let path = self.file_path(key)?;
        let contents = self.get(key)?;

        let mut files = self.files.lock().await;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        if files.contains_key(key) {
            options.truncate(true).create(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                DcexecError::Store(format!("{} exists and was not written by this worker", path.display()))
            } else {
                DcexecError::Store(format!("creating {}: {}", path.display(), e))
            }
        })?;
        files.insert(key.to_string(), path.clone());
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| DcexecError::Store(format!("writing {}: {}", path.display(), e)))?;
        file.flush().await?;

        tracing::info!("Stored value of '{}' in {}", key, path.display());
        Ok(path)
    }

    /// Deletes the file written for `key` and returns its path.
    pub async fn delete_file(&self, key: &str) -> Result<PathBuf> {
        let mut files = self.files.lock().await;
        let path = files
            .remove(key)
            .ok_or_else(|| DcexecError::Store(format!("no file stored for key: {}", key)))?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| DcexecError::Store(format!("deleting {}: {}", path.display(), e)))?;
        tracing::info!("Deleted {}", path.display());
        Ok(path)
    }

    /// Deletes every stored file, returning how many were removed.
    pub async fn delete_files(&self) -> usize {
        let paths: Vec<PathBuf> = self.files.lock().await.drain().map(|(_, path)| path).collect();
        let mut removed = 0;
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
        removed
    }

    /// Paths of every stored file, sorted.
    pub async fn files(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.lock().await.values().cloned().collect();
        paths.sort();
        paths
    }

    /// Keys name a single file inside the storage directory.
    fn file_path(&self, key: &str) -> Result<PathBuf> {
        let plain = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !plain {
            return Err(DcexecError::InvalidRequest(format!(
                "key '{}' cannot be used as a file name",
                key
            )));
        }
        Ok(self.dir.join(key))
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("dir", &self.dir)
            .field("values", &self.values().len())
            .finish()
    }
}

fn unknown_key(key: &str) -> DcexecError {
    DcexecError::Store(format!("key not known: {}", key))
}
