//! Configuration loading and resolution
//!
//! Resolution follows a fixed priority order:
//! 1. Command-line `--config` path (highest priority)
//! 2. `FORTUNE_CONFIG` environment variable
//! 3. Platform config file (`<config_dir>/fortune/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! Missing files never abort startup: a warning is logged and defaults are used.
//! A file that exists but fails to parse is a configuration error.
//!
//! Individual ranking/cache options can additionally be overridden through
//! `FORTUNE_*` environment variables after the file is loaded.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FORTUNE_CONFIG";

/// Default number of ranked periods returned (including the current one)
pub const DEFAULT_PERIOD_COUNT: usize = 10;

/// Default number of notable years kept per period
pub const DEFAULT_YEARS_PER_PERIOD_CAP: usize = 3;

/// Default TTL for the date-independent raw chart cache (30 days)
pub const DEFAULT_RAW_CACHE_TTL_SECONDS: u64 = 2_592_000;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub ranking: RankingConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (overridden by `RUST_LOG`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Shape of the ranked output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// How many ranked periods to return, current period included
    pub period_count: usize,
    /// Maximum notable years retained per period
    pub years_per_period_cap: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            period_count: DEFAULT_PERIOD_COUNT,
            years_per_period_cap: DEFAULT_YEARS_PER_PERIOD_CAP,
        }
    }
}

/// Two-tier raw chart cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL of shared-tier entries (date-independent raw lists only)
    pub raw_cache_ttl_seconds: u64,
    /// Maximum entries held by the local tier
    pub local_capacity: usize,
    /// TTL of local-tier entries
    pub local_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            raw_cache_ttl_seconds: DEFAULT_RAW_CACHE_TTL_SECONDS,
            local_capacity: 1024,
            local_ttl_seconds: 3600,
        }
    }
}

/// Request pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Overall per-request deadline in milliseconds
    pub deadline_ms: u64,
    /// Process-wide bound on concurrently running upstream fetches
    pub max_concurrent_fetches: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 5000,
            max_concurrent_fetches: 32,
        }
    }
}

impl TomlConfig {
    /// Reject values that would make ranking or caching meaningless
    pub fn validate(&self) -> Result<()> {
        if self.ranking.period_count == 0 {
            return Err(Error::Config("ranking.period_count must be at least 1".to_string()));
        }
        if self.cache.raw_cache_ttl_seconds == 0 {
            return Err(Error::Config(
                "cache.raw_cache_ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if self.cache.local_ttl_seconds == 0 {
            return Err(Error::Config(
                "cache.local_ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if self.pipeline.max_concurrent_fetches == 0 {
            return Err(Error::Config(
                "pipeline.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.pipeline.deadline_ms == 0 {
            return Err(Error::Config("pipeline.deadline_ms must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Apply `FORTUNE_*` environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_parse::<usize>("FORTUNE_PERIOD_COUNT")? {
            self.ranking.period_count = value;
        }
        if let Some(value) = env_parse::<usize>("FORTUNE_YEARS_PER_PERIOD_CAP")? {
            self.ranking.years_per_period_cap = value;
        }
        if let Some(value) = env_parse::<u64>("FORTUNE_RAW_CACHE_TTL_SECONDS")? {
            self.cache.raw_cache_ttl_seconds = value;
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{} has invalid value '{}': {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

/// Resolves which config file (if any) to load
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file by priority; `None` means compiled defaults
    pub fn resolve_path(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config file
        default_config_path().filter(|path| path.exists())
    }

    /// Load, override from environment, and validate
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match self.resolve_path() {
            Some(path) => load_toml_config(&path)?,
            None => {
                info!("No config file found, using compiled defaults");
                TomlConfig::default()
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }
}

/// Platform-specific default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fortune").join("config.toml"))
}

/// Read a TOML config file
///
/// A missing file yields defaults with a warning; a malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
