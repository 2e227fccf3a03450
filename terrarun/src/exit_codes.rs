//! Stable exit codes for the terrarun CLI.

/// Run completed, or was cancelled on request.
pub const OK: i32 = 0;
/// Planning, checkout, fetch, tool or export failure.
pub const FAILED: i32 = 1;
/// Invalid settings or arguments.
pub const INVALID: i32 = 2;
