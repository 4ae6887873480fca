//! Protocol-wide constants shared by the planner, the store and the control plane.

use std::time::Duration;

/// Fixed size of every part except the last: 5 MiB.
pub const CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Highest part number the control plane will issue a destination for.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Sessions older than this are discarded instead of resumed.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Error codes carried in the `code` field of a control-plane error reply.
pub mod error_codes {
    /// Missing or invalid bearer credential.
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// Size, type or part-number policy violation.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// Unknown session or object key.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Storage backend failure.
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}
