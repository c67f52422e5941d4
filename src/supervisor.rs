//! Start/stop/status/restart orchestration over a service catalog.
use std::{
    fmt, thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use strum_macros::{AsRefStr, Display};
use tracing::{debug, error, info, warn};

use crate::{
    config::{ServiceCatalog, ServiceDefinition, SupervisorSettings},
    error::SupervisorError,
    identity::{ProcessIdentifier, ProcessIdentity, ProcessTable, SystemProcessTable},
    launcher::ProcessLauncher,
    runtime::RuntimePaths,
    store::{PidRecord, PidStore},
};

/// Lifecycle states a service moves through under supervision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ServiceState {
    /// Not running and never launched under this runtime directory.
    Unknown,
    /// A live process matches the service's launch command.
    Running,
    /// Termination was requested and the supervisor is waiting for exit.
    Stopping,
    /// Not running, but launched or recorded here before.
    Stopped,
}

/// Result of a single-service operation that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new process was launched.
    Started { pid: u32 },
    /// The service was already running; nothing was done.
    AlreadyRunning { pid: u32 },
    /// The process exited after being signalled.
    Stopped { pid: u32 },
    /// There was nothing to stop.
    NotRunning,
    /// The service was stopped (if it was running) and started again.
    Restarted { previous: Option<u32>, pid: u32 },
}

/// Observed status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Running as the given PID.
    Running { pid: u32 },
    /// No live process matches.
    NotRunning,
}

impl ServiceStatus {
    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running { .. })
    }

    /// PID of the running service.
    pub fn pid(&self) -> Option<u32> {
        match self {
            ServiceStatus::Running { pid } => Some(*pid),
            ServiceStatus::NotRunning => None,
        }
    }
}

/// Status line for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Service name.
    pub service: String,
    /// Observed status.
    pub status: ServiceStatus,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            ServiceStatus::Running { pid } => {
                write!(f, "Status of {} service: Running (pid {pid})", self.service)
            }
            ServiceStatus::NotRunning => {
                write!(f, "Status of {} service: NOT Running", self.service)
            }
        }
    }
}

/// Outcome of one service within a batch.
#[derive(Debug)]
pub struct ServiceReport {
    /// Service name.
    pub service: String,
    /// What happened to it.
    pub result: Result<Outcome, SupervisorError>,
}

impl ServiceReport {
    /// Whether the operation failed for this service.
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

impl fmt::Display for ServiceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let service = &self.service;
        match &self.result {
            Ok(Outcome::Started { pid }) => write!(f, "{service} is started (pid {pid})."),
            Ok(Outcome::AlreadyRunning { pid }) => {
                write!(f, "{service} service has been started! (pid {pid})")
            }
            Ok(Outcome::Stopped { .. }) => write!(f, "{service} service is stopped."),
            Ok(Outcome::NotRunning) => write!(f, "{service} service is not started!"),
            Ok(Outcome::Restarted { pid, .. }) => {
                write!(f, "{service} is restarted (pid {pid}).")
            }
            Err(err) => write!(f, "{err}"),
        }
    }
}

/// Per-service outcomes of a batch operation, in request order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per requested service.
    pub entries: Vec<ServiceReport>,
}

impl BatchReport {
    /// Whether every service in the batch completed.
    pub fn is_success(&self) -> bool {
        !self.entries.iter().any(ServiceReport::is_failure)
    }

    /// Entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ServiceReport> {
        self.entries.iter().filter(|entry| entry.is_failure())
    }

    /// Looks up the entry for `service`.
    pub fn get(&self, service: &str) -> Option<&ServiceReport> {
        self.entries.iter().find(|entry| entry.service == service)
    }
}

/// Drives service lifecycles using live process identity.
///
/// The PID record written on start is only a hint; every decision is taken on
/// the identity resolved from the live process table.
///
/// Operations on one service are serialized across invocations with an
/// advisory lock. `status` reads without locking.
pub struct ServiceSupervisor<T = SystemProcessTable> {
    catalog: ServiceCatalog,
    identifier: ProcessIdentifier<T>,
    launcher: ProcessLauncher,
    store: PidStore,
    settings: SupervisorSettings,
}

impl ServiceSupervisor<SystemProcessTable> {
    /// Creates a supervisor over the OS process table.
    pub fn new(catalog: ServiceCatalog, paths: RuntimePaths, settings: SupervisorSettings) -> Self {
        Self::with_process_table(catalog, paths, settings, SystemProcessTable)
    }
}

impl<T: ProcessTable> ServiceSupervisor<T> {
    /// Creates a supervisor over a custom process table.
    pub fn with_process_table(
        catalog: ServiceCatalog,
        paths: RuntimePaths,
        settings: SupervisorSettings,
        table: T,
    ) -> Self {
        Self {
            catalog,
            identifier: ProcessIdentifier::new(table),
            launcher: ProcessLauncher::new(),
            store: PidStore::new(paths),
            settings,
        }
    }

    /// Catalog this supervisor manages.
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// PID record store.
    pub fn store(&self) -> &PidStore {
        &self.store
    }

    /// Starts `name` unless it is already running.
    pub fn start(&self, name: &str) -> Result<Outcome, SupervisorError> {
        let def = self.definition(name)?;
        let _lock = self.store.lock(name)?;

        if let Some(identity) = self.resolve(def) {
            info!("Service '{name}' is already running as PID {}", identity.pid);
            return Ok(Outcome::AlreadyRunning { pid: identity.pid });
        }

        info!("Starting service '{name}': `{}`", def.command_line());
        let identity = self.launcher.launch(def)?;
        if let Err(err) = self.store.save(&PidRecord::from_identity(&identity)) {
            warn!("Service '{name}' started but its PID record was not saved: {err}");
        }
        self.transition(name, ServiceState::Unknown, ServiceState::Running);

        Ok(Outcome::Started { pid: identity.pid })
    }

    /// Sends SIGTERM to `name` and waits for it to exit.
    ///
    /// Any other live process with the same launch command is stopped the same
    /// way before the record is removed.
    ///
    /// Waits forever unless a stop timeout is configured, in which case the
    /// process is left running and [`SupervisorError::StopTimeout`] is returned.
    pub fn stop(&self, name: &str) -> Result<Outcome, SupervisorError> {
        let def = self.definition(name)?;
        let _lock = self.store.lock(name)?;

        let Some(identity) = self.resolve(def) else {
            match self.store.remove(name) {
                Ok(true) => debug!("Removed stale PID record for '{name}'"),
                Ok(false) => {}
                Err(err) => warn!("Failed to remove stale PID record for '{name}': {err}"),
            }
            info!("Service '{name}' is not running");
            return Ok(Outcome::NotRunning);
        };

        info!("Stopping service '{name}' (PID {})", identity.pid);
        self.terminate(&identity)?;
        self.transition(name, ServiceState::Running, ServiceState::Stopping);

        self.wait_for_exit(&identity)?;
        self.stop_duplicates(def, &identity)?;
        self.store.remove(name)?;
        self.transition(name, ServiceState::Stopping, ServiceState::Stopped);

        Ok(Outcome::Stopped { pid: identity.pid })
    }

    /// Stops `name` if it is running, then starts it again.
    pub fn restart(&self, name: &str) -> Result<Outcome, SupervisorError> {
        let previous = match self.stop(name)? {
            Outcome::Stopped { pid } => Some(pid),
            _ => None,
        };

        match self.start(name)? {
            Outcome::Started { pid } | Outcome::AlreadyRunning { pid } => {
                Ok(Outcome::Restarted { previous, pid })
            }
            other => Ok(other),
        }
    }

    /// Reports whether `name` is running. Never fails for a stopped service.
    pub fn status(&self, name: &str) -> Result<ServiceStatus, SupervisorError> {
        let def = self.definition(name)?;
        Ok(match self.resolve(def) {
            Some(identity) => ServiceStatus::Running { pid: identity.pid },
            None => ServiceStatus::NotRunning,
        })
    }

    /// Reports the status of every catalog service, in catalog order.
    pub fn status_all(&self) -> Vec<StatusReport> {
        self.catalog
            .services()
            .iter()
            .map(|def| StatusReport {
                service: def.name.clone(),
                status: match self.resolve(def) {
                    Some(identity) => ServiceStatus::Running { pid: identity.pid },
                    None => ServiceStatus::NotRunning,
                },
            })
            .collect()
    }

    /// Reports the lifecycle state of `name`.
    ///
    /// A service that is not running is `Stopped` once it has been launched
    /// (its log exists) or recorded, and `Unknown` otherwise.
    pub fn state(&self, name: &str) -> Result<ServiceState, SupervisorError> {
        let def = self.definition(name)?;
        if self.resolve(def).is_some() {
            return Ok(ServiceState::Running);
        }
        let launched_here = def.log_path.exists() || self.store.hint(name).is_some();
        Ok(if launched_here {
            ServiceState::Stopped
        } else {
            ServiceState::Unknown
        })
    }

    /// Starts each service in order, continuing past failures.
    pub fn start_many<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        self.batch(names, |name| self.start(name))
    }

    /// Stops each service in order, continuing past failures.
    pub fn stop_many<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        self.batch(names, |name| self.stop(name))
    }

    fn batch<S, F>(&self, names: &[S], op: F) -> BatchReport
    where
        S: AsRef<str>,
        F: Fn(&str) -> Result<Outcome, SupervisorError>,
    {
        let entries = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let result = op(name);
                if let Err(err) = &result {
                    error!("{err}");
                }
                ServiceReport {
                    service: name.to_string(),
                    result,
                }
            })
            .collect();
        BatchReport { entries }
    }

    fn definition(&self, name: &str) -> Result<&ServiceDefinition, SupervisorError> {
        self.catalog
            .get(name)
            .ok_or_else(|| SupervisorError::UnknownService(name.to_string()))
    }

    fn resolve(&self, def: &ServiceDefinition) -> Option<ProcessIdentity> {
        let lookup = self.identifier.lookup(def, self.store.hint(&def.name));
        if let Some(identity) = &lookup.identity
            && lookup.is_ambiguous()
        {
            warn!(
                "{}",
                SupervisorError::AmbiguousMatch {
                    service: def.name.clone(),
                    pid: identity.pid,
                    others: lookup.others.clone(),
                }
            );
        }
        lookup.identity
    }

    /// Stops every remaining live process that carries `def`'s launch command.
    fn stop_duplicates(
        &self,
        def: &ServiceDefinition,
        stopped: &ProcessIdentity,
    ) -> Result<(), SupervisorError> {
        loop {
            let lookup = self.identifier.lookup(def, None);
            let Some(first) = lookup.identity else {
                return Ok(());
            };

            let mut duplicates = vec![first.pid];
            duplicates.extend(lookup.others);
            warn!(
                "{}",
                SupervisorError::AmbiguousMatch {
                    service: def.name.clone(),
                    pid: stopped.pid,
                    others: duplicates.clone(),
                }
            );

            let identities: Vec<ProcessIdentity> = duplicates
                .into_iter()
                .map(|pid| ProcessIdentity { pid, ..first.clone() })
                .collect();
            for identity in &identities {
                info!("Stopping duplicate of '{}' (PID {})", def.name, identity.pid);
                self.terminate(identity)?;
            }
            for identity in &identities {
                self.wait_for_exit(identity)?;
            }
        }
    }

    fn terminate(&self, identity: &ProcessIdentity) -> Result<(), SupervisorError> {
        // 0 and negative values address process groups rather than a process.
        let Some(raw) = i32::try_from(identity.pid).ok().filter(|raw| *raw > 0) else {
            return Err(SupervisorError::SignalFailure {
                service: identity.service.clone(),
                pid: identity.pid,
                source: Errno::EINVAL,
            });
        };
        let pid = Pid::from_raw(raw);
        match signal::kill(pid, Signal::SIGTERM) {
            Ok(()) => {
                debug!("Sent SIGTERM to '{}' (PID {pid})", identity.service);
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(
                    "Service '{}' exited before SIGTERM could be delivered",
                    identity.service
                );
                Ok(())
            }
            Err(source) => Err(SupervisorError::SignalFailure {
                service: identity.service.clone(),
                pid: identity.pid,
                source,
            }),
        }
    }

    /// Polls until `identity` no longer names a live process.
    fn wait_for_exit(&self, identity: &ProcessIdentity) -> Result<(), SupervisorError> {
        let started = Instant::now();
        let interval = self.settings.poll_interval.max(Duration::from_millis(1));

        loop {
            if !self.identifier.is_live(identity) {
                debug!(
                    "Service '{}' (PID {}) exited after {:?}",
                    identity.service,
                    identity.pid,
                    started.elapsed()
                );
                return Ok(());
            }

            let waited = started.elapsed();
            let sleep_for = match self.settings.stop_timeout {
                Some(limit) if waited >= limit => {
                    warn!(
                        "Service '{}' did not exit after SIGTERM within {limit:?}",
                        identity.service
                    );
                    return Err(SupervisorError::StopTimeout {
                        service: identity.service.clone(),
                        pid: identity.pid,
                        waited,
                    });
                }
                Some(limit) => interval.min(limit - waited),
                None => interval,
            };
            thread::sleep(sleep_for);
        }
    }

    fn transition(&self, name: &str, from: ServiceState, to: ServiceState) {
        debug!("Service '{name}': {from} -> {to}");
    }
}
