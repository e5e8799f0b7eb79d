//! Trust decisions for directories that supply context templates.
//!
//! The trust list is re-read on every check; decisions are never cached.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::trust::{TrustList, normalize};

/// Directory trust backed by the user's trust-list file.
#[derive(Debug, Clone)]
pub struct TrustModel {
    data_dir: PathBuf,
    trust_file: PathBuf,
}

impl TrustModel {
    /// `data_dir` is always trusted; `trust_file` holds one glob per line.
    pub fn new(data_dir: impl Into<PathBuf>, trust_file: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            trust_file: trust_file.into(),
        }
    }

    pub fn trust_file(&self) -> &Path {
        &self.trust_file
    }

    /// Whether `dir` may supply executable template content.
    ///
    /// Relative `dir` values and relative patterns resolve against the
    /// current working directory.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn is_directory_trusted(&self, dir: &Path) -> Result<bool> {
        if !dir.is_dir() || !self.trust_file.is_file() {
            debug!("not a directory or no trust list");
            return Ok(false);
        }

        let cwd = std::env::current_dir().context("resolve current directory")?;
        let absolute = normalize(&cwd.join(dir));
        if absolute == normalize(&cwd.join(&self.data_dir)) {
            return Ok(true);
        }

        let text = fs::read_to_string(&self.trust_file)
            .with_context(|| format!("read {}", self.trust_file.display()))?;
        let list = TrustList::parse(&text, &cwd);
        if list.is_empty() {
            debug!("trust list is empty");
            return Ok(false);
        }
        let matched = list.matching_pattern(&absolute);
        debug!(pattern = ?matched, patterns = list.len(), "trust evaluated");
        Ok(matched.is_some())
    }
}
