//! Development-time tracing.
//!
//! - **Tracing (this module)**: dev diagnostics via `RUST_LOG`, output to stderr.
//! - **Reporter (`io/reporter`)**: user-facing notices and warnings, printed
//!   regardless of `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn`, or `houston=debug` when `verbose`.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=houston=debug hu list all open ports
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,houston=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
