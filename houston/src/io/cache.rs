//! Content-addressed, encrypted on-disk cache for expensive computations.
//!
//! Each entry is one file named by the fingerprint of the base64-encoded JSON
//! serialization of the input. The payload is the JSON serialization of the
//! output, encrypted under a secret derived from the input and its type.
//!
//! Cache failures never fail the caller: unreadable entries are discarded and
//! recomputed, and write or eviction problems are reported as warnings.

use std::any::type_name;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::core::crypto::{decrypt, encrypt};
use crate::core::fingerprint::fingerprint;
use crate::io::reporter::Reporter;

/// Either a real file cache or a pass-through that caches nothing.
#[derive(Debug)]
pub enum Cache {
    Disabled,
    File(FileCache),
}

impl Cache {
    /// Cache that always calls `compute`.
    pub fn none() -> Self {
        Cache::Disabled
    }

    /// Return the cached output for `input`, or compute and store it.
    pub fn load_or_compute<I, O, E, F>(&self, input: &I, compute: F) -> Result<O, E>
    where
        I: Serialize,
        O: Serialize + DeserializeOwned,
        F: FnOnce(&I) -> Result<O, E>,
    {
        match self {
            Cache::Disabled => compute(input),
            Cache::File(cache) => cache.load_or_compute(input, compute),
        }
    }
}

/// Name and secret of the entry for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EntryKey {
    name: String,
    secret: String,
}

impl EntryKey {
    fn for_input<I: Serialize>(input: &I) -> Result<Self> {
        let serialized = serde_json::to_vec(input).context("serialize cache input")?;
        let encoded = BASE64.encode(serialized);
        let type_tag = fingerprint(type_name::<I>());
        Ok(Self {
            name: fingerprint(&encoded),
            secret: fingerprint(format!("{encoded}{type_tag}")),
        })
    }
}

#[derive(Debug)]
pub struct FileCache {
    dir: PathBuf,
    size_limit: u64,
    reporter: Arc<Reporter>,
}

impl FileCache {
    /// Cache rooted at `dir` (created on demand), evicting down to `size_limit` bytes.
    pub fn new(dir: impl Into<PathBuf>, size_limit: u64, reporter: Arc<Reporter>) -> Self {
        Self {
            dir: dir.into(),
            size_limit,
            reporter,
        }
    }

    /// Path of the entry that would hold the output for `input`.
    pub fn entry_path<I: Serialize>(&self, input: &I) -> Result<PathBuf> {
        Ok(self.dir.join(EntryKey::for_input(input)?.name))
    }

    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn load_or_compute<I, O, E, F>(&self, input: &I, compute: F) -> Result<O, E>
    where
        I: Serialize,
        O: Serialize + DeserializeOwned,
        F: FnOnce(&I) -> Result<O, E>,
    {
        let key = match EntryKey::for_input(input) {
            Ok(key) => key,
            Err(err) => {
                self.reporter
                    .warn(format!("Cache disabled for this request: {err:#}"));
                return compute(input);
            }
        };
        let path = self.dir.join(&key.name);

        if path.is_file() {
            match read_entry::<O>(&path, &key.secret) {
                Ok(output) => {
                    debug!(entry = %key.name, "cache hit");
                    return Ok(output);
                }
                Err(err) => {
                    self.reporter.warn(format!(
                        "Discarding unreadable cache entry {}: {err:#}",
                        path.display()
                    ));
                    if let Err(err) = fs::remove_file(&path) {
                        self.reporter.warn(format!(
                            "Could not delete cache entry {}: {err}",
                            path.display()
                        ));
                    }
                }
            }
        }

        debug!(entry = %key.name, "cache miss");
        let output = compute(input)?;

        if let Err(err) = self.store(&path, &key.secret, &output) {
            self.reporter.warn(format!("Could not write cache entry: {err:#}"));
        }
        if let Err(err) = self.evict() {
            self.reporter.warn(format!("Cache eviction failed: {err:#}"));
        }
        Ok(output)
    }

    fn store<O: Serialize>(&self, path: &Path, secret: &str, output: &O) -> Result<()> {
        let plaintext = serde_json::to_vec(output).context("serialize cache output")?;
        let payload = encrypt(&plaintext, secret);
        if payload.len() as u64 > self.size_limit {
            self.reporter.warn(format!(
                "Cache entry of {} bytes exceeds the cache size limit of {} bytes",
                payload.len(),
                self.size_limit
            ));
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache directory {}", self.dir.display()))?;
        fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
        debug!(path = %path.display(), "cache entry written");
        Ok(())
    }

    /// Delete least recently modified entries until the total size fits the limit.
    ///
    /// Returns the number of deleted entries.
    pub fn evict(&self) -> Result<usize> {
        let mut entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|entry| entry.len).sum();
        if total <= self.size_limit {
            return Ok(0);
        }

        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        let mut removed = 0;
        for entry in entries {
            if total <= self.size_limit {
                break;
            }
            fs::remove_file(&entry.path)
                .with_context(|| format!("delete {}", entry.path.display()))?;
            total -= entry.len;
            removed += 1;
        }
        debug!(removed, total, limit = self.size_limit, "cache evicted");
        Ok(removed)
    }

    /// Total size in bytes of all entries.
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.entries()?.iter().map(|entry| entry.len).sum())
    }

    fn entries(&self) -> Result<Vec<EntryMeta>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for item in fs::read_dir(&self.dir)
            .with_context(|| format!("list cache directory {}", self.dir.display()))?
        {
            let item = item.context("read cache directory entry")?;
            let meta = item
                .metadata()
                .with_context(|| format!("stat {}", item.path().display()))?;
            if !meta.is_file() {
                continue;
            }
            entries.push(EntryMeta {
                path: item.path(),
                len: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }
}

struct EntryMeta {
    path: PathBuf,
    len: u64,
    modified: SystemTime,
}

fn read_entry<O: DeserializeOwned>(path: &Path, secret: &str) -> Result<O> {
    let payload = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let plaintext = decrypt(&payload, secret)?;
    serde_json::from_slice(&plaintext).context("deserialize cache entry")
}
