//! Persisted per-service PID records and advisory locks.
use std::{
    fs::{self, File, OpenOptions},
    io::ErrorKind,
    path::Path,
};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{PidRecordError, SupervisorError},
    identity::ProcessIdentity,
    runtime::RuntimePaths,
};

/// Cached identity of a launched service.
///
/// Only a hint: the PID is re-validated against the live process table
/// before it is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidRecord {
    /// Service name.
    pub service: String,
    /// PID reported at launch.
    pub pid: u32,
    /// Command line the service was launched with.
    pub command: Vec<String>,
    /// Launch timestamp.
    pub started_at: DateTime<Utc>,
}

impl PidRecord {
    /// Builds a record for a freshly launched identity.
    pub fn from_identity(identity: &ProcessIdentity) -> Self {
        Self {
            service: identity.service.clone(),
            pid: identity.pid,
            command: identity.fingerprint.clone(),
            started_at: Utc::now(),
        }
    }
}

/// Reads and writes PID records under the runtime directory.
#[derive(Debug, Clone)]
pub struct PidStore {
    paths: RuntimePaths,
}

impl PidStore {
    /// Creates a store rooted at `paths`.
    pub fn new(paths: RuntimePaths) -> Self {
        Self { paths }
    }

    /// Runtime layout backing this store.
    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    /// Loads the record for `service`, if present.
    pub fn load(&self, service: &str) -> Result<Option<PidRecord>, PidRecordError> {
        let path = self.paths.pid_record(service);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record = serde_json::from_str::<PidRecord>(&contents)?;
        Ok(Some(record))
    }

    /// Returns the recorded PID, treating unreadable records as absent.
    pub fn hint(&self, service: &str) -> Option<u32> {
        match self.load(service) {
            Ok(record) => record.map(|record| record.pid),
            Err(err) => {
                warn!("Ignoring unreadable PID record for '{service}': {err}");
                None
            }
        }
    }

    /// Writes (or overwrites) the record for its service.
    pub fn save(&self, record: &PidRecord) -> Result<(), PidRecordError> {
        let path = self.paths.pid_record(&record.service);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        debug!("Recorded PID {} for '{}'", record.pid, record.service);
        Ok(())
    }

    /// Removes the record for `service`. Returns whether a record existed.
    pub fn remove(&self, service: &str) -> Result<bool, PidRecordError> {
        match fs::remove_file(self.paths.pid_record(service)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Takes the exclusive advisory lock for `service`, blocking until it is free.
    pub fn lock(&self, service: &str) -> Result<ServiceLock, SupervisorError> {
        let path = self.paths.lock_file(service);
        ServiceLock::acquire(&path).map_err(|source| SupervisorError::Lock {
            service: service.to_string(),
            source,
        })
    }
}

/// Exclusive advisory lock on a service, released on drop.
#[derive(Debug)]
pub struct ServiceLock {
    file: File,
}

impl ServiceLock {
    fn acquire(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for ServiceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
