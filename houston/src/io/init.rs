//! Layout and first-run scaffolding of the Houston home directory.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::config::{HoustonConfig, write_config};

/// Overrides the home directory location.
pub const HOME_ENV: &str = "HOUSTON_HOME";

/// Extension of named context files in the home directory.
pub const CONTEXT_EXTENSION: &str = "ctxt";

/// All canonical paths within the Houston home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoustonPaths {
    pub home: PathBuf,
    pub config_path: PathBuf,
    pub trust_path: PathBuf,
    pub default_context_path: PathBuf,
    pub cache_dir: PathBuf,
}

impl HoustonPaths {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config_path: home.join("config.toml"),
            trust_path: home.join("trusted_dirs"),
            default_context_path: home.join(format!("default.{CONTEXT_EXTENSION}")),
            cache_dir: home.join("cache"),
            home,
        }
    }

    /// Locate the home directory from the process environment.
    pub fn discover() -> Result<Self> {
        resolve_home(
            std::env::var_os(HOME_ENV),
            std::env::var_os("XDG_CONFIG_HOME"),
            dirs::home_dir(),
        )
        .map(Self::new)
        .ok_or_else(|| anyhow!("cannot determine home directory; set {HOME_ENV}"))
    }

    /// Path of the named context `<name>.ctxt`.
    pub fn named_context(&self, name: &str) -> PathBuf {
        self.home.join(format!("{name}.{CONTEXT_EXTENSION}"))
    }
}

/// `$HOUSTON_HOME`, else `$XDG_CONFIG_HOME/houston`, else `<home>/.config/houston`.
/// Empty variables count as unset.
pub fn resolve_home(
    houston_home: Option<OsString>,
    xdg_config_home: Option<OsString>,
    user_home: Option<PathBuf>,
) -> Option<PathBuf> {
    let non_empty = |value: Option<OsString>| value.filter(|v| !v.is_empty()).map(PathBuf::from);
    non_empty(houston_home)
        .or_else(|| non_empty(xdg_config_home).map(|dir| dir.join("houston")))
        .or_else(|| user_home.map(|home| home.join(".config").join("houston")))
}

/// What `init_home` created on this call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
}

impl InitReport {
    pub fn created_config(&self, paths: &HoustonPaths) -> bool {
        self.created.contains(&paths.config_path)
    }
}

/// Create the home directory and its default files.
///
/// Existing files are never overwritten.
pub fn init_home(paths: &HoustonPaths) -> Result<InitReport> {
    if paths.home.exists() && !paths.home.is_dir() {
        return Err(anyhow!(
            "houston home {} exists but is not a directory",
            paths.home.display()
        ));
    }
    fs::create_dir_all(&paths.home)
        .with_context(|| format!("create directory {}", paths.home.display()))?;

    let mut report = InitReport::default();
    for path in [&paths.trust_path, &paths.default_context_path] {
        if create_empty(path)? {
            report.created.push(path.clone());
        }
    }
    if !paths.config_path.exists() {
        write_config(&paths.config_path, &HoustonConfig::default())?;
        report.created.push(paths.config_path.clone());
    }

    debug!(home = %paths.home.display(), created = report.created.len(), "home initialized");
    Ok(report)
}

fn create_empty(path: &Path) -> Result<bool> {
    match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err).with_context(|| format!("create {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    #[test]
    fn init_creates_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HoustonPaths::new(temp.path().join("houston"));

        let report = init_home(&paths).expect("init");

        assert!(paths.home.is_dir());
        assert!(paths.trust_path.is_file());
        assert!(paths.default_context_path.is_file());
        assert!(report.created_config(&paths));
        assert_eq!(report.created.len(), 3);
        assert_eq!(
            load_config(&paths.config_path).expect("load"),
            HoustonConfig::default()
        );
    }

    #[test]
    fn init_never_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HoustonPaths::new(temp.path());
        fs::write(&paths.trust_path, "/projects/*\n").expect("write");
        fs::write(&paths.config_path, "default_shell = \"zsh\"\n").expect("write");

        let report = init_home(&paths).expect("init");
        assert_eq!(report.created, vec![paths.default_context_path.clone()]);
        assert_eq!(
            fs::read_to_string(&paths.trust_path).expect("read"),
            "/projects/*\n"
        );
        assert_eq!(
            load_config(&paths.config_path).expect("load").default_shell,
            "zsh"
        );

        let again = init_home(&paths).expect("init again");
        assert!(again.created.is_empty());
    }

    #[test]
    fn init_rejects_file_in_place_of_home() {
        let temp = tempfile::tempdir().expect("tempdir");
        let home = temp.path().join("houston");
        fs::write(&home, "").expect("write");
        assert!(init_home(&HoustonPaths::new(home)).is_err());
    }

    #[test]
    fn home_resolution_order() {
        let user = Some(PathBuf::from("/home/u"));
        assert_eq!(
            resolve_home(Some("/custom".into()), Some("/xdg".into()), user.clone()),
            Some(PathBuf::from("/custom"))
        );
        assert_eq!(
            resolve_home(Some("".into()), Some("/xdg".into()), user.clone()),
            Some(PathBuf::from("/xdg/houston"))
        );
        assert_eq!(
            resolve_home(None, None, user),
            Some(PathBuf::from("/home/u/.config/houston"))
        );
        assert_eq!(resolve_home(None, None, None), None);
    }

    #[test]
    fn named_context_path() {
        let paths = HoustonPaths::new("/h");
        assert_eq!(paths.named_context("docker"), PathBuf::from("/h/docker.ctxt"));
        assert_eq!(paths.default_context_path, PathBuf::from("/h/default.ctxt"));
    }
}
