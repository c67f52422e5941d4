//! Runtime directory layout.
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_RUNTIME_DIR, LOCK_FILE_NAME, LOG_FILE_EXTENSION, PID_RECORD_FILE_NAME,
};

/// Where per-service state and logs are kept.
///
/// Every service owns `<root>/<service>/`, holding its log file, the cached
/// PID record and the advisory lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    root: PathBuf,
}

impl RuntimePaths {
    /// Creates a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Runtime root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by a single service.
    pub fn service_dir(&self, service: &str) -> PathBuf {
        self.root.join(service)
    }

    /// Log file receiving the service's stdout and stderr.
    pub fn log_file(&self, service: &str) -> PathBuf {
        self.service_dir(service)
            .join(format!("{service}.{LOG_FILE_EXTENSION}"))
    }

    /// Cached PID record.
    pub fn pid_record(&self, service: &str) -> PathBuf {
        self.service_dir(service).join(PID_RECORD_FILE_NAME)
    }

    /// Advisory lock file.
    pub fn lock_file(&self, service: &str) -> PathBuf {
        self.service_dir(service).join(LOCK_FILE_NAME)
    }
}

impl Default for RuntimePaths {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME_DIR)
    }
}
