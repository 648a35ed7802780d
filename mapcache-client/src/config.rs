//! Configuration loading for the mapcache client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use mapcache_core::CacheConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when `--config` is not given.
pub const CONFIG_ENV: &str = "MAPCACHE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Sent as the `apiKey` header when present.
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub freshness_threshold_ms: u64,
    pub cluster_debounce_ms: u64,
    pub cluster_points: u32,
    pub clusters_enabled: bool,
    pub log_json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or MAPCACHE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args(std::env::args().skip(1)).or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if matches!(&self.api_key, Some(key) if key.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "api_key",
                reason: "must not be blank when set".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cluster_points == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cluster_points",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The cache-layer settings this file describes.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .with_freshness_threshold(Duration::from_millis(self.freshness_threshold_ms))
            .with_cluster_debounce(Duration::from_millis(self.cluster_debounce_ms))
            .with_cluster_points(self.cluster_points)
            .with_clusters_enabled(self.clusters_enabled)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

pub(crate) fn config_path_from_args<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
