//! User-facing notices with per-instance warning/error counters.
//!
//! Every notice is also mirrored into `tracing` at debug level, so
//! `RUST_LOG=houston=debug` captures them even when the reporter is quiet.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

#[derive(Debug, Default)]
pub struct Reporter {
    quiet: bool,
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

impl Reporter {
    /// Reporter that prints notices to the terminal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter that only counts (and traces) notices.
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    pub fn info(&self, message: impl Display) {
        debug!(kind = "info", "{message}");
        if !self.quiet {
            println!("{message}");
        }
    }

    pub fn warn(&self, message: impl Display) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        debug!(kind = "warning", "{message}");
        if !self.quiet {
            eprintln!("WARNING: {message}");
        }
    }

    pub fn error(&self, message: impl Display) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        debug!(kind = "error", "{message}");
        if !self.quiet {
            eprintln!("ERROR: {message}");
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }
}
