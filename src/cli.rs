//! Command-line interface for ovservice.
use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::{Parser, Subcommand};
use tracing::{level_filters::LevelFilter, warn};

use crate::{
    config::{ServiceCatalog, SupervisorSettings, parse_duration},
    constants::{BASIC_GROUP_NAME, RUNTIME_DIR_ENV},
    error::SupervisorError,
};

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" | "err" => LevelFilter::ERROR,
            "warn" | "warning" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => return Err(format!("invalid log level '{trimmed}'")),
        };

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for ovservice.
#[derive(Parser)]
#[command(name = "ovservice", version)]
#[command(about = "Start, stop and inspect local services", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Directory holding per-service logs and PID records.
    #[arg(long, value_name = "DIR", global = true, env = RUNTIME_DIR_ENV)]
    pub runtime_dir: Option<PathBuf>,

    /// Give up waiting for a stopped service after this long (e.g. "30", "10s", "2m").
    /// Waits indefinitely when omitted.
    #[arg(long, value_name = "DURATION", global = true, value_parser = parse_duration)]
    pub stop_timeout: Option<Duration>,

    /// Milliseconds between checks while waiting for a service to exit.
    #[arg(long, value_name = "MILLIS", global = true, default_value_t = 200)]
    pub poll_interval: u64,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Wait-loop settings requested on the command line.
    pub fn settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            poll_interval: Duration::from_millis(self.poll_interval),
            stop_timeout: self.stop_timeout,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start a service, or the basic services when none is named.
    Start {
        /// Start the basic services. Takes precedence over a service name.
        #[arg(long)]
        basic: bool,

        /// Service to start.
        service: Option<String>,
    },

    /// Stop a service, or every service when none is named.
    Stop {
        /// Stop only the basic services. Takes precedence over a service name.
        #[arg(long, conflicts_with = "all")]
        basic: bool,

        /// Stop every service. Takes precedence over a service name.
        #[arg(long)]
        all: bool,

        /// Service to stop.
        service: Option<String>,
    },

    /// Stop and start a single service.
    Restart {
        /// Service to restart.
        service: String,
    },

    /// Show whether services are running.
    Status {
        /// Report on every service. Takes precedence over a service name.
        #[arg(long)]
        all: bool,

        /// Service to report on.
        service: Option<String>,
    },
}

/// Which services a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The catalog's basic subset.
    Basic,
    /// Every catalog service.
    All,
    /// One named service.
    Service(String),
}

impl Target {
    /// Expands the target into service names, in catalog order for groups.
    pub fn services(&self, catalog: &ServiceCatalog) -> Result<Vec<String>, SupervisorError> {
        match self {
            Target::Basic => Ok(catalog.basic().to_vec()),
            Target::All => Ok(catalog.names()),
            Target::Service(name) if catalog.contains(name) => Ok(vec![name.clone()]),
            Target::Service(name) => Err(SupervisorError::UnknownService(name.clone())),
        }
    }
}

impl Commands {
    /// Resolves the command's flags and argument into a target.
    ///
    /// Group flags always win over an explicit service name, and the name
    /// `basic` selects the basic subset.
    pub fn target(&self) -> Target {
        match self {
            Commands::Start { basic, service } => {
                group_or_service(*basic, Target::Basic, service, Target::Basic)
            }
            Commands::Stop {
                basic,
                all,
                service,
            } => {
                if *basic {
                    group_or_service(true, Target::Basic, service, Target::All)
                } else {
                    group_or_service(*all, Target::All, service, Target::All)
                }
            }
            Commands::Restart { service } => Target::Service(service.clone()),
            Commands::Status { all, service } => {
                group_or_service(*all, Target::All, service, Target::All)
            }
        }
    }
}

fn group_or_service(
    flag: bool,
    group: Target,
    service: &Option<String>,
    default: Target,
) -> Target {
    match service.as_deref() {
        Some(name) if flag => {
            warn!("Ignoring service '{name}' because a group flag was given");
            group
        }
        _ if flag => group,
        Some(BASIC_GROUP_NAME) => Target::Basic,
        Some(name) => Target::Service(name.to_string()),
        None => default,
    }
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
