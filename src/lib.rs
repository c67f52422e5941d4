//! ovservice is a local service supervisor. It launches a fixed catalog of
//! services as detached processes, remembers which OS process belongs to which
//! service across invocations, and stops, restarts and reports on them.
//!
//! A service is recognised by the exact command line it was launched with, so
//! a recycled PID never passes for a running service.

/// CLI interface.
pub mod cli;

/// Service catalog and supervisor settings.
pub mod config;

/// Shared constants.
pub mod constants;

/// Error handling.
pub mod error;

/// Process identity resolution against the live process table.
pub mod identity;

/// Detached process launching.
pub mod launcher;

/// Runtime directory layout.
pub mod runtime;

/// Persisted PID records and per-service locks.
pub mod store;

/// Service lifecycle orchestration.
pub mod supervisor;
