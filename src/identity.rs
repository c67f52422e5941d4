//! Process identity resolution.
//!
//! A service is identified by the exact argument vector it was launched with.
//! The live process table is the source of truth: a remembered PID is only
//! trusted after its current command line has been compared against the
//! service's launch arguments, which rules out PIDs recycled by the OS.
use std::ffi::OsString;

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

use crate::config::ServiceDefinition;

/// The durable fact "service S is running as OS process P".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    /// Logical service name.
    pub service: String,
    /// OS process id.
    pub pid: u32,
    /// Command line the process was launched with.
    pub fingerprint: Vec<String>,
}

/// A live process as seen in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// OS process id.
    pub pid: u32,
    /// Current argument vector.
    pub args: Vec<String>,
}

/// Read-only view of the OS process table.
///
/// Implementations must omit zombies and threads; only processes that can
/// still be signalled and still carry a command line count as live.
pub trait ProcessTable {
    /// All live processes, in ascending PID order.
    fn processes(&self) -> Vec<ProcessEntry>;

    /// A single live process.
    fn process(&self, pid: u32) -> Option<ProcessEntry>;
}

/// Process table backed by `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always)
    }

    fn entry(pid: Pid, process: &sysinfo::Process) -> Option<ProcessEntry> {
        if process.thread_kind().is_some() {
            return None;
        }
        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return None;
        }

        let args: Vec<String> = process.cmd().iter().map(os_to_string).collect();
        if args.is_empty() {
            // Kernel threads and exiting processes carry no argv.
            return None;
        }

        Some(ProcessEntry {
            pid: pid.as_u32(),
            args,
        })
    }
}

impl ProcessTable for SystemProcessTable {
    fn processes(&self) -> Vec<ProcessEntry> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            Self::refresh_kind(),
        );

        let mut entries: Vec<ProcessEntry> = system
            .processes()
            .iter()
            .filter_map(|(pid, process)| Self::entry(*pid, process))
            .collect();
        entries.sort_by_key(|entry| entry.pid);
        entries
    }

    fn process(&self, pid: u32) -> Option<ProcessEntry> {
        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            Self::refresh_kind(),
        );

        system
            .process(target)
            .and_then(|process| Self::entry(target, process))
    }
}

fn os_to_string(value: &OsString) -> String {
    value.to_string_lossy().into_owned()
}

/// Result of a resolution, including any additional matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    /// The selected identity, if any process matches.
    pub identity: Option<ProcessIdentity>,
    /// Other live processes that carry the same fingerprint.
    pub others: Vec<u32>,
}

impl Lookup {
    /// Whether more than one live process matched.
    pub fn is_ambiguous(&self) -> bool {
        !self.others.is_empty()
    }
}

/// Matches service definitions against the live process table.
#[derive(Debug, Clone, Default)]
pub struct ProcessIdentifier<T = SystemProcessTable> {
    table: T,
}

impl<T: ProcessTable> ProcessIdentifier<T> {
    /// Creates an identifier over the given process table.
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// Returns the live identity of `def`, if any.
    ///
    /// `hint` is a previously recorded PID. It is checked first and trusted
    /// only if that process still runs `def.launch_args`.
    pub fn resolve(&self, def: &ServiceDefinition, hint: Option<u32>) -> Option<ProcessIdentity> {
        self.lookup(def, hint).identity
    }

    /// Like [`resolve`](Self::resolve), but reports every other matching PID
    /// when a full scan was needed.
    pub fn lookup(&self, def: &ServiceDefinition, hint: Option<u32>) -> Lookup {
        if let Some(pid) = hint {
            match self.table.process(pid) {
                Some(entry) if entry.args == def.launch_args => {
                    return Lookup {
                        identity: Some(self.identity(def, pid)),
                        others: Vec::new(),
                    };
                }
                Some(entry) => debug!(
                    "Recorded PID {pid} for '{}' now runs `{}`; ignoring stale record",
                    def.name,
                    entry.args.join(" ")
                ),
                None => debug!(
                    "Recorded PID {pid} for '{}' is no longer alive",
                    def.name
                ),
            }
        }

        let mut matches = self
            .table
            .processes()
            .into_iter()
            .filter(|entry| entry.args == def.launch_args)
            .map(|entry| entry.pid);

        match matches.next() {
            Some(pid) => Lookup {
                identity: Some(self.identity(def, pid)),
                others: matches.collect(),
            },
            None => Lookup::default(),
        }
    }

    /// Whether `identity` still refers to a live process with its fingerprint.
    pub fn is_live(&self, identity: &ProcessIdentity) -> bool {
        self.table
            .process(identity.pid)
            .is_some_and(|entry| entry.args == identity.fingerprint)
    }

    fn identity(&self, def: &ServiceDefinition, pid: u32) -> ProcessIdentity {
        ProcessIdentity {
            service: def.name.clone(),
            pid,
            fingerprint: def.launch_args.clone(),
        }
    }
}
