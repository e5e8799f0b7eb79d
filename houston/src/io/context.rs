//! Discovery and evaluation of context files.
//!
//! Implicit context files (`.houston`, `houston.ctxt`) are collected from the
//! working directory and each of its ancestors, followed by the user's
//! `default.ctxt` and any requested named contexts. Only files in trusted
//! directories are evaluated; their `${...}` markers run through a
//! [`CmdRunner`].

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::template::{TemplateError, expand_line};
use crate::core::trust::normalize;
use crate::io::cmd::CmdRunner;
use crate::io::init::HoustonPaths;
use crate::io::reporter::Reporter;
use crate::io::trust::TrustModel;

/// File names picked up in the working directory and its ancestors.
pub const DIRECTORY_CONTEXT_NAMES: [&str; 2] = [".houston", "houston.ctxt"];

/// A requested named context: `name` or `name:arg1 arg2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextCall {
    pub name: String,
    pub args: Vec<String>,
}

impl ContextCall {
    pub fn parse(raw: &str) -> Self {
        let (name, args) = raw.split_once(':').unwrap_or((raw, ""));
        Self {
            name: name.trim().to_string(),
            args: args.split_whitespace().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextOrigin {
    Implicit,
    Named { name: String, args: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFile {
    pub path: PathBuf,
    pub origin: ContextOrigin,
}

impl ContextFile {
    fn implicit(path: PathBuf) -> Self {
        Self {
            path,
            origin: ContextOrigin::Implicit,
        }
    }

    /// Arguments passed to every marker command in this file.
    pub fn args(&self) -> Vec<&str> {
        match &self.origin {
            ContextOrigin::Implicit => Vec::new(),
            ContextOrigin::Named { args, .. } => args.iter().map(String::as_str).collect(),
        }
    }

    /// Directory whose trust governs this file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("/"))
    }
}

impl fmt::Display for ContextFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context file {}, line {line}", path.display())]
    Template {
        path: PathBuf,
        /// 1-based.
        line: usize,
        #[source]
        source: TemplateError,
    },

    #[error("read context file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Collect context files for a run started in `start_dir` (absolute).
///
/// Order: implicit files from `start_dir` up to the root, `default.ctxt`,
/// then named contexts in request order. Missing named contexts are reported
/// and skipped. Paths that normalize to the same file are kept once.
pub fn discover_context_files(
    start_dir: &Path,
    paths: &HoustonPaths,
    calls: &[ContextCall],
    reporter: &Reporter,
) -> Vec<ContextFile> {
    let mut found = Vec::new();

    let mut dir = Some(start_dir);
    while let Some(current) = dir {
        for name in DIRECTORY_CONTEXT_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                found.push(ContextFile::implicit(candidate));
            }
        }
        dir = current.parent();
    }

    if paths.default_context_path.is_file() {
        found.push(ContextFile::implicit(paths.default_context_path.clone()));
    }

    for call in calls {
        let path = paths.named_context(&call.name);
        if path.is_file() {
            found.push(ContextFile {
                path,
                origin: ContextOrigin::Named {
                    name: call.name.clone(),
                    args: call.args.clone(),
                },
            });
        } else {
            reporter.warn(format!(
                "Context file '{}' not found in {}",
                path.file_name().map_or_else(
                    || call.name.clone(),
                    |name| name.to_string_lossy().into_owned()
                ),
                paths.home.display()
            ));
        }
    }

    let mut seen = HashSet::new();
    found.retain(|file| seen.insert(normalize(&file.path)));
    debug!(count = found.len(), "context files discovered");
    found
}

/// Outcome of evaluating a set of context files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextReport {
    /// Non-blank evaluated texts of trusted files, in input order.
    pub texts: Vec<String>,
    pub trusted: Vec<PathBuf>,
    pub untrusted: Vec<PathBuf>,
}

/// Evaluates trusted context files through a command runner.
pub struct ContextEngine<R> {
    runner: R,
    trust: TrustModel,
    reporter: Arc<Reporter>,
}

impl<R: CmdRunner> ContextEngine<R> {
    pub fn new(runner: R, trust: TrustModel, reporter: Arc<Reporter>) -> Self {
        Self {
            runner,
            trust,
            reporter,
        }
    }

    /// Evaluate every trusted file; untrusted files are reported and skipped.
    ///
    /// The first evaluation failure aborts with a [`ContextError`].
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn evaluate(&self, files: &[ContextFile]) -> Result<ContextReport> {
        let mut report = ContextReport::default();
        for file in files {
            if !self.trust.is_directory_trusted(file.dir())? {
                self.reporter.warn(format!(
                    "The directory {} is not trusted - the context file {} will be ignored.",
                    file.dir().display(),
                    file.path.display()
                ));
                report.untrusted.push(file.path.clone());
                continue;
            }

            self.reporter
                .info(format!("Adding context from {}", file.path.display()));
            let text = self.evaluate_file(file)?;
            if !text.trim().is_empty() {
                report.texts.push(text);
            }
            report.trusted.push(file.path.clone());
        }
        Ok(report)
    }

    /// Expand every line of `file`, joining the results with `\n`.
    pub fn evaluate_file(&self, file: &ContextFile) -> Result<String, ContextError> {
        let content = fs::read_to_string(&file.path).map_err(|source| ContextError::Read {
            path: file.path.clone(),
            source,
        })?;
        let args = file.args();

        let mut lines = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let expanded = expand_line(line, |command| self.run_marker(command, &args))
                .map_err(|source| ContextError::Template {
                    path: file.path.clone(),
                    line: index + 1,
                    source,
                })?;
            lines.push(expanded);
        }
        Ok(lines.join("\n"))
    }

    fn run_marker(&self, command: &str, args: &[&str]) -> Result<String, TemplateError> {
        match self.runner.run(command, args) {
            Ok(result) if result.exit_code == 0 => Ok(result.stdout),
            Ok(result) => Err(TemplateError::CommandFailed {
                command: command.to_string(),
                exit_code: result.exit_code,
                stderr: result.first_error_line().to_string(),
            }),
            Err(err) => Err(TemplateError::Launch {
                command: command.to_string(),
                reason: format!("{err:#}"),
            }),
        }
    }
}
