//! Turn a natural-language goal into a runnable shell script.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (fingerprints, the cache cipher,
//!   trust-pattern matching, template expansion, prompt rendering). No I/O.
//! - **[`io`]**: Side-effecting operations (home directory, configuration,
//!   trust list, context files, processes, the on-disk cache, HTTP).
//!
//! [`generate`] combines prompt rendering, the cache and a completion
//! provider; [`cli`] implements the `hu` command on top of everything else.

pub mod cli;
pub mod core;
pub mod exit_codes;
pub mod generate;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
