//! Stable exit codes for the `hu` CLI.
//!
//! When a generated script runs, `hu` exits with the script's own exit code
//! instead.

/// Nothing ran, or the run completed without engine errors.
pub const OK: i32 = 0;
/// Generation, context evaluation or another engine step failed.
pub const FAILURE: i32 = 1;
/// The configuration file is invalid or no API key is available.
pub const INVALID_CONFIG: i32 = 2;
