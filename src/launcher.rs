//! Spawns services as detached processes.
use std::{
    fs::{self, File},
    io,
    os::unix::process::CommandExt,
    process::{Command, Stdio},
    thread,
};

use tracing::{debug, error, info};

use crate::{config::ServiceDefinition, error::SupervisorError, identity::ProcessIdentity};

/// Launches service processes with their output redirected to a log file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Creates a launcher.
    pub fn new() -> Self {
        Self
    }

    /// Spawns `def` and returns its identity without waiting for readiness.
    ///
    /// The child gets its own session via `setsid()`, so neither the
    /// supervisor exiting nor a terminal hangup reaches it. Stdout and stderr
    /// both go to `def.log_path`, which is truncated first.
    pub fn launch(&self, def: &ServiceDefinition) -> Result<ProcessIdentity, SupervisorError> {
        let failure = |source: io::Error| SupervisorError::LaunchFailure {
            service: def.name.clone(),
            source,
        };

        let (program, args) = def.launch_args.split_first().ok_or_else(|| {
            failure(io::Error::new(
                io::ErrorKind::InvalidInput,
                "launch command is empty",
            ))
        })?;

        let stdout = open_log(def).map_err(failure)?;
        let stderr = stdout.try_clone().map_err(failure)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        if let Some(dir) = &def.working_dir {
            cmd.current_dir(dir);
        }

        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        debug!("Executing command for '{}': {cmd:?}", def.name);

        let mut child = cmd.spawn().map_err(|err| {
            error!("Failed to start service '{}': {err}", def.name);
            failure(err)
        })?;
        let pid = child.id();
        info!("Service '{}' launched with PID {pid}", def.name);

        // Reap the child once it exits so long-lived callers do not collect zombies.
        let service = def.name.clone();
        let reaper = thread::Builder::new()
            .name(format!("reap-{service}"))
            .spawn(move || match child.wait() {
                Ok(status) => debug!("Service '{service}' (PID {pid}) exited: {status}"),
                Err(err) => debug!("Failed to reap service '{service}' (PID {pid}): {err}"),
            });
        if let Err(err) = reaper {
            debug!("Could not start reaper for '{}': {err}", def.name);
        }

        Ok(ProcessIdentity {
            service: def.name.clone(),
            pid,
            fingerprint: def.launch_args.clone(),
        })
    }
}

/// Creates the log directory if needed and truncates the log file.
fn open_log(def: &ServiceDefinition) -> io::Result<File> {
    if let Some(dir) = def.log_path.parent()
        && !dir.as_os_str().is_empty()
        && let Err(err) = fs::create_dir_all(dir)
        && !dir.is_dir()
    {
        return Err(err);
    }

    File::create(&def.log_path)
}
