//! Service definitions, the service catalog and supervisor settings.
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    constants::{BASIC_SERVICES, DEFAULT_STOP_POLL_INTERVAL, OTHER_SERVICES},
    error::SupervisorError,
    runtime::RuntimePaths,
};

/// Everything the supervisor needs to know to launch a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Unique service name.
    pub name: String,
    /// Program followed by its arguments, already tokenized.
    pub launch_args: Vec<String>,
    /// File receiving the service's stdout and stderr.
    pub log_path: PathBuf,
    /// Directory the service runs in. Inherited from the supervisor when unset.
    pub working_dir: Option<PathBuf>,
}

impl ServiceDefinition {
    /// Creates a definition without a working directory.
    pub fn new<I, S>(name: impl Into<String>, launch_args: I, log_path: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            launch_args: launch_args.into_iter().map(Into::into).collect(),
            log_path: log_path.into(),
            working_dir: None,
        }
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The command line rendered for humans.
    pub fn command_line(&self) -> String {
        self.launch_args.join(" ")
    }
}

/// Immutable, ordered set of services plus the basic subset.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    services: Vec<ServiceDefinition>,
    basic: Vec<String>,
}

impl ServiceCatalog {
    /// Builds a catalog, rejecting duplicate names, empty launch commands and
    /// basic members missing from the catalog.
    pub fn new(
        services: Vec<ServiceDefinition>,
        basic: Vec<String>,
    ) -> Result<Self, SupervisorError> {
        let mut seen = HashSet::new();
        for service in &services {
            if service.name.is_empty() {
                return Err(SupervisorError::InvalidCatalog(
                    "service names cannot be empty".into(),
                ));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(SupervisorError::InvalidCatalog(format!(
                    "duplicate service '{}'",
                    service.name
                )));
            }
            if service.launch_args.is_empty() {
                return Err(SupervisorError::InvalidCatalog(format!(
                    "service '{}' has an empty launch command",
                    service.name
                )));
            }
        }

        if let Some(missing) = basic.iter().find(|name| !seen.contains(name.as_str())) {
            return Err(SupervisorError::InvalidCatalog(format!(
                "basic service '{missing}' is not defined"
            )));
        }

        Ok(Self { services, basic })
    }

    /// Builds the stock catalog rooted at an installation directory.
    ///
    /// `mongodb` and `redis` run their own binaries; every other service runs
    /// under the service wrapper with its `wrapper.conf`.
    pub fn from_install_root(
        install_root: &Path,
        runtime: &RuntimePaths,
    ) -> Result<Self, SupervisorError> {
        let services_dir = install_root.join("services");
        let wrapper = install_root.join("bin/wrapper/wrapper");

        let services = BASIC_SERVICES
            .iter()
            .chain(OTHER_SERVICES.iter())
            .map(|name| {
                let service_dir = services_dir.join(name);
                let launch_args = match *name {
                    "mongodb" => vec![
                        path_arg(&service_dir.join("bin/mongod")),
                        "--config".to_string(),
                        path_arg(&service_dir.join("mongodb.conf")),
                    ],
                    "redis" => vec![
                        path_arg(&service_dir.join("bin/redis-server")),
                        path_arg(&service_dir.join("redis.conf")),
                    ],
                    _ => vec![path_arg(&wrapper), path_arg(&service_dir.join("wrapper.conf"))],
                };
                ServiceDefinition::new(*name, launch_args, runtime.log_file(name))
            })
            .collect();

        let basic = BASIC_SERVICES.iter().map(|name| name.to_string()).collect();
        Self::new(services, basic)
    }

    /// Looks up a service by name.
    pub fn get(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|service| service.name == name)
    }

    /// Whether the catalog defines `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All services in catalog order.
    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    /// All service names in catalog order.
    pub fn names(&self) -> Vec<String> {
        self.services.iter().map(|service| service.name.clone()).collect()
    }

    /// Names of the basic subset.
    pub fn basic(&self) -> &[String] {
        &self.basic
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Tunables for the stop wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Delay between identifier polls while waiting for exit.
    pub poll_interval: Duration,
    /// Upper bound on the exit wait. `None` waits forever.
    pub stop_timeout: Option<Duration>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_STOP_POLL_INTERVAL,
            stop_timeout: None,
        }
    }
}

/// Parses a user-facing duration string in the format `<number>[ms|s|m|h]`.
///
/// A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, SupervisorError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(SupervisorError::InvalidDuration(raw.to_string()));
    }

    if let Some(millis) = value.strip_suffix("ms") {
        let amount: u64 = millis
            .trim()
            .parse()
            .map_err(|_| SupervisorError::InvalidDuration(raw.to_string()))?;
        return Ok(Duration::from_millis(amount));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str
        .parse()
        .map_err(|_| SupervisorError::InvalidDuration(raw.to_string()))?;

    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}
