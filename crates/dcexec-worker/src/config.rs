//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use dcexec_common::{DcexecError, Result};

/// Where the worker keeps uploaded binaries and how long they may run.
///
/// # Fields
///
/// - `storage_dir` - Directory uploaded binaries are written to (default: the system temp dir)
/// - `execution_timeout` - Maximum run time of one execution (default: 30 seconds)
/// - `max_upload_bytes` - Largest binary accepted (default: 64 MiB)
///
/// # Example
///
/// ```
/// use dcexec_worker::WorkerConfig;
/// use std::time::Duration;
///
/// let config = WorkerConfig::new()
///     .with_storage_dir("/var/tmp/dcexec")
///     .with_execution_timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub storage_dir: PathBuf,
    pub execution_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            storage_dir: std::env::temp_dir(),
            execution_timeout: Duration::from_secs(30),
            max_upload_bytes: 64 * 1024 * 1024,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`DcexecError::Config`] if:
    /// - Execution timeout is zero
    /// - Execution timeout is longer than 1 hour
    /// - The upload limit is zero
    pub fn validate(&self) -> Result<()> {
        if self.execution_timeout.is_zero() {
            return Err(DcexecError::Config(
                "execution timeout must be greater than zero".to_string(),
            ));
        }

        if self.execution_timeout.as_secs() > 3600 {
            return Err(DcexecError::Config(format!(
                "execution timeout must be <= 1 hour (got {} seconds)",
                self.execution_timeout.as_secs()
            )));
        }

        if self.max_upload_bytes == 0 {
            return Err(DcexecError::Config("upload limit must be greater than zero".to_string()));
        }

        Ok(())
    }
}
