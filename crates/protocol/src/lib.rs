//! Wire protocol types for KioskSync admin-kiosk communication.
//!
//! Every endpoint of the admin server has explicit request/response types
//! here; nothing loosely-shaped crosses the wire. Paths in all messages use
//! forward slashes regardless of host OS.

pub mod messages;
pub mod paths;
pub mod types;

/// Files at or above this size take the resumable streaming path: 10 MiB.
pub const LARGE_FILE_THRESHOLD: i64 = 10 * 1024 * 1024;

/// Default number of paths per `/request_files` batch.
pub const FILE_INFO_BATCH_SIZE: usize = 5;

/// Hard cap on paths per `/request_files` call, enforced server-side.
pub const MAX_FILES_PER_REQUEST: usize = 64;

/// Suffix appended to a file's final path for its resumable sidecar.
pub const TEMP_SUFFIX: &str = ".temp";
