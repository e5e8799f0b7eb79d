//! Facts about the host used as script requirements.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Human-readable OS description, e.g. `linux (Ubuntu) (x86_64)`.
pub fn os_description() -> String {
    let distro = if cfg!(target_os = "linux") {
        fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|text| distro_name(&text))
    } else {
        None
    };
    describe_os(std::env::consts::OS, distro.as_deref(), std::env::consts::ARCH)
}

fn describe_os(os: &str, distro: Option<&str>, arch: &str) -> String {
    match distro {
        Some(distro) => format!("{os} ({distro}) ({arch})"),
        None => format!("{os} ({arch})"),
    }
}

/// Distribution name from `/etc/os-release` content, without a `Linux` suffix.
fn distro_name(os_release: &str) -> Option<String> {
    let value = os_release
        .lines()
        .find_map(|line| line.trim().strip_prefix("NAME="))?;
    let name = value.replace(['"', '\''], "").replace("Linux", "");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Files below `root`, as paths relative to it, sorted.
///
/// `depth` limits how many directory levels are descended: `Some(0)` lists
/// only files directly in `root`. Unreadable entries are skipped.
pub fn list_files(root: &Path, depth: Option<usize>) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(root).follow_links(false).min_depth(1);
    if let Some(depth) = depth {
        walker = walker.max_depth(depth + 1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(err = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}
