//! Constants and default values used throughout ovservice.
//!
//! File names, environment variables and timing defaults live here so the
//! supervisor, the CLI and the tests agree on them.

use std::time::Duration;

// ============================================================================
// File System Constants
// ============================================================================

/// Default runtime directory holding one sub-directory per service.
pub const DEFAULT_RUNTIME_DIR: &str = "/tmp/ovservice";

/// Name of the cached PID record inside a service directory.
pub const PID_RECORD_FILE_NAME: &str = "pid.json";

/// Name of the advisory lock file inside a service directory.
pub const LOCK_FILE_NAME: &str = "lock";

/// Extension of the per-service log file (`<service>.log`).
pub const LOG_FILE_EXTENSION: &str = "log";

// ============================================================================
// Environment
// ============================================================================

/// Installation root used to build the default catalog's command paths.
pub const INSTALL_ROOT_ENV: &str = "NG_HOME";

/// Optional override for the runtime directory.
pub const RUNTIME_DIR_ENV: &str = "OVSERVICE_RUNTIME_DIR";

// ============================================================================
// Default Catalog
// ============================================================================

/// Services started when no explicit target is given.
pub const BASIC_SERVICES: [&str; 4] = ["activemq", "mongodb", "ovclient", "tomcat"];

/// Remaining catalog entries.
pub const OTHER_SERVICES: [&str; 4] = ["redis", "sip", "vmmanager", "scheduler"];

/// Pseudo service name selecting the basic subset.
pub const BASIC_GROUP_NAME: &str = "basic";

// ============================================================================
// Process Management Timing
// ============================================================================

/// Interval between identifier polls while waiting for a service to exit.
pub const DEFAULT_STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);

// ============================================================================
// Exit Codes
// ============================================================================

/// At least one requested operation failed.
pub const EXIT_FAILURE: u8 = 1;

/// The invocation itself was invalid (unknown service, missing environment).
pub const EXIT_USAGE: u8 = 2;
