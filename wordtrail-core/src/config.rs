//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/wordtrail/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/wordtrail/` (~/.config/wordtrail/)
//! - State/Logs: `$XDG_STATE_HOME/wordtrail/` (~/.local/state/wordtrail/)
//!
//! Every field has a default, so an absent file or an empty table is valid.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Cache TTLs and ceilings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Change event handling
    #[serde(default)]
    pub changes: ChangeConfig,

    /// Document aggregation tuning
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cache configuration.
///
/// TTLs are grouped by operation class rather than per operation.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// TTL for corpus-wide totals (summary, streaks)
    #[serde(default = "default_totals_ttl")]
    pub totals_ttl_secs: u64,

    /// TTL for per-granularity analytics (buckets, trends, correlations)
    #[serde(default = "default_analytics_ttl")]
    pub analytics_ttl_secs: u64,

    /// TTL for date-range and folder analytics
    #[serde(default = "default_range_ttl")]
    pub range_ttl_secs: u64,

    /// Maximum number of cached entries
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Maximum approximate memory held by cached payloads
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            totals_ttl_secs: default_totals_ttl(),
            analytics_ttl_secs: default_analytics_ttl(),
            range_ttl_secs: default_range_ttl(),
            max_entries: default_max_entries(),
            max_memory_bytes: default_max_memory_bytes(),
        }
    }
}

impl CacheConfig {
    /// TTL for the given operation class.
    pub fn ttl(&self, class: TtlClass) -> Duration {
        let secs = match class {
            TtlClass::Totals => self.totals_ttl_secs,
            TtlClass::Granularity => self.analytics_ttl_secs,
            TtlClass::Range => self.range_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Operation classes that share a cache TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Corpus-wide totals
    Totals,
    /// Per-granularity analytics
    Granularity,
    /// Date-range and folder analytics
    Range,
}

fn default_totals_ttl() -> u64 {
    5 * 60
}

fn default_analytics_ttl() -> u64 {
    10 * 60
}

fn default_range_ttl() -> u64 {
    15 * 60
}

fn default_max_entries() -> usize {
    50
}

fn default_max_memory_bytes() -> usize {
    10 * 1024 * 1024
}

/// Change event configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ChangeConfig {
    /// Quiet period before a burst of modify events invalidates the cache
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ChangeConfig {
    /// Debounce delay as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    1000
}

/// Aggregation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    /// Documents read concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Trailing days used for trend, prediction and correlation series
    #[serde(default = "default_analysis_window_days")]
    pub analysis_window_days: u32,

    /// Size above which a recently modified document counts as growing
    #[serde(default = "default_large_document_bytes")]
    pub large_document_bytes: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            analysis_window_days: default_analysis_window_days(),
            large_document_bytes: default_large_document_bytes(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

fn default_analysis_window_days() -> u32 {
    30
}

fn default_large_document_bytes() -> u64 {
    10 * 1024
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the engine degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.aggregation.batch_size == 0 {
            return Err(Error::Config(
                "aggregation.batch_size must be at least 1".to_string(),
            ));
        }
        if self.aggregation.analysis_window_days == 0 {
            return Err(Error::Config(
                "aggregation.analysis_window_days must be at least 1".to_string(),
            ));
        }
        if self.cache.max_entries == 0 || self.cache.max_memory_bytes == 0 {
            return Err(Error::Config(
                "cache.max_entries and cache.max_memory_bytes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/wordtrail/config.toml` (~/.config/wordtrail/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("wordtrail").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/wordtrail/` (~/.local/state/wordtrail/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("wordtrail")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/wordtrail/wordtrail.log` (~/.local/state/wordtrail/wordtrail.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("wordtrail.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.cache.max_memory_bytes, 10 * 1024 * 1024);
        assert_eq!(config.changes.debounce_ms, 1000);
        assert_eq!(config.aggregation.batch_size, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttl_classes() {
        let cache = CacheConfig::default();
        assert_eq!(cache.ttl(TtlClass::Totals), Duration::from_secs(300));
        assert_eq!(cache.ttl(TtlClass::Granularity), Duration::from_secs(600));
        assert_eq!(cache.ttl(TtlClass::Range), Duration::from_secs(900));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[cache]
totals_ttl_secs = 60
max_entries = 10

[changes]
debounce_ms = 250

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.cache.totals_ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 10);
        // Unset fields keep their defaults
        assert_eq!(config.cache.analytics_ttl_secs, 600);
        assert_eq!(config.changes.debounce(), Duration::from_millis(250));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let mut config = Config::default();
        config.aggregation.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[aggregation]\nbatch_size = 8\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.aggregation.batch_size, 8);

        std::fs::write(&path, "[aggregation]\nbatch_size = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_log_path() {
        assert!(Config::log_path().ends_with("wordtrail.log"));
    }
}
