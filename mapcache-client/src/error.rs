//! Error types for the client binary.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cache(#[from] mapcache_core::CacheError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid header value for {header}: {reason}")]
    InvalidHeader { header: &'static str, reason: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Failed to initialize tracing: {0}")]
    Telemetry(String),
    #[error("Usage: {0}")]
    Usage(String),
}

impl From<mapcache_core::ConfigError> for ClientError {
    fn from(err: mapcache_core::ConfigError) -> Self {
        Self::Cache(err.into())
    }
}
