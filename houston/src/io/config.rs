//! User configuration stored in `<home>/config.toml`.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Environment variable consulted when `openai.api_key` is unset.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CACHE_LIMIT_BYTES: u64 = 100 * 1024 * 1024;

/// Houston configuration (TOML).
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HoustonConfig {
    /// Shell used to run generated scripts.
    pub default_shell: String,

    /// Shell used to evaluate `${...}` markers in context files.
    pub default_context_shell: String,

    pub default_run_mode: RunMode,

    pub cache: CacheConfig,

    pub openai: OpenAiConfig,
}

/// What to do with a generated script.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Ask for confirmation before running.
    #[default]
    Ask,
    /// Run without asking.
    Force,
    /// Never run; only print.
    Dry,
}

impl RunMode {
    /// Resolve command-line overrides against the configured mode.
    ///
    /// `dry` wins over `force`.
    pub fn resolve(configured: RunMode, force: bool, dry: bool) -> RunMode {
        if dry {
            RunMode::Dry
        } else if force {
            RunMode::Force
        } else {
            configured
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Eviction budget for the sum of all entry sizes.
    pub size_limit_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size_limit_bytes: DEFAULT_CACHE_LIMIT_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Takes precedence over `OPENAI_API_KEY` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

/// API key whose `Debug` output never shows the secret.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Shell used when the configuration does not name one.
pub fn os_default_shell() -> &'static str {
    if cfg!(windows) { "powershell" } else { "bash" }
}

impl Default for HoustonConfig {
    fn default() -> Self {
        Self {
            default_shell: os_default_shell().to_string(),
            default_context_shell: os_default_shell().to_string(),
            default_run_mode: RunMode::default(),
            cache: CacheConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

impl HoustonConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_shell.trim().is_empty() {
            return Err(anyhow!("default_shell must not be empty"));
        }
        if self.default_context_shell.trim().is_empty() {
            return Err(anyhow!("default_context_shell must not be empty"));
        }
        if self.cache.size_limit_bytes == 0 {
            return Err(anyhow!("cache.size_limit_bytes must be > 0"));
        }
        if self.openai.model.trim().is_empty() {
            return Err(anyhow!("openai.model must not be empty"));
        }
        if self.openai.max_tokens == 0 {
            return Err(anyhow!("openai.max_tokens must be > 0"));
        }
        if self.openai.timeout_secs == 0 {
            return Err(anyhow!("openai.timeout_secs must be > 0"));
        }
        if self.openai.base_url.trim().is_empty() {
            return Err(anyhow!("openai.base_url must not be empty"));
        }
        Ok(())
    }

    /// Configured key, else `env_value` (the `OPENAI_API_KEY` value). Blank
    /// keys count as missing.
    pub fn api_key(&self, env_value: Option<String>) -> Option<ApiKey> {
        self.openai
            .api_key
            .clone()
            .filter(|key| !key.expose().trim().is_empty())
            .or_else(|| {
                env_value
                    .filter(|value| !value.trim().is_empty())
                    .map(ApiKey::new)
            })
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HoustonConfig::default()`.
pub fn load_config(path: &Path) -> Result<HoustonConfig> {
    if !path.exists() {
        let cfg = HoustonConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HoustonConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HoustonConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
