//! Glob matching of directories against the user's trust list.
//!
//! Patterns use filesystem glob semantics: `*` stays within one path segment,
//! `**` spans segments. Paths and patterns are compared in a normalized,
//! absolute, `/`-separated form.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Parsed trust list: one glob pattern per non-blank line.
#[derive(Debug, Clone, Default)]
pub struct TrustList {
    patterns: Vec<TrustPattern>,
}

#[derive(Debug, Clone)]
struct TrustPattern {
    raw: String,
    /// Normalized absolute pattern without a trailing separator.
    glob: Pattern,
}

impl TrustList {
    /// Parse trust-list text. Relative patterns are resolved against `base`.
    ///
    /// Lines that are not valid glob patterns are skipped with a warning.
    pub fn parse(text: &str, base: &Path) -> Self {
        let patterns = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| TrustPattern::compile(line, base))
            .collect();
        Self { patterns }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the first pattern matching `dir`, if any.
    ///
    /// `dir` should already be absolute; it is normalized lexically and
    /// stripped of any trailing separator before matching.
    pub fn matching_pattern(&self, dir: &Path) -> Option<&str> {
        let path = to_slash(&normalize(dir));
        let bare = trim_trailing_slash(&path);
        self.patterns
            .iter()
            .find(|pattern| pattern.glob.matches_with(bare, MATCH_OPTIONS))
            .map(|pattern| pattern.raw.as_str())
    }

    pub fn matches(&self, dir: &Path) -> bool {
        self.matching_pattern(dir).is_some()
    }
}

impl TrustPattern {
    fn compile(line: &str, base: &Path) -> Option<Self> {
        let unified = line.replace('\\', "/");
        let absolute = if Path::new(&unified).is_absolute() {
            PathBuf::from(&unified)
        } else {
            base.join(&unified)
        };
        let normalized = to_slash(&normalize(&absolute));
        match Pattern::new(trim_trailing_slash(&normalized)) {
            Ok(glob) => Some(Self {
                raw: line.to_string(),
                glob,
            }),
            Err(err) => {
                warn!(pattern = line, err = %err, "ignoring invalid trust pattern");
                None
            }
        }
    }
}

/// Lexically normalize `path`: drop `.` segments and resolve `..` against
/// preceding segments. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
