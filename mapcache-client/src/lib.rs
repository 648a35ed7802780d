//! mapcache Client - HTTP Transport and CLI
//!
//! Wires the cache pipeline to a real API: TOML configuration, a reqwest
//! transport, tracing bootstrap and the `mapcache` command.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod telemetry;

pub use cli::Command;
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use http::HttpTransport;
pub use telemetry::init_tracing;

use mapcache_loader::LoaderContext;
use std::sync::Arc;

/// Loader context backed by [`HttpTransport`] and the file's cache settings.
pub fn build_context(config: &ClientConfig) -> Result<LoaderContext, ClientError> {
    let cache_config = config.cache_config();
    cache_config.validate()?;
    let transport = HttpTransport::new(config)?;
    Ok(LoaderContext::new(Arc::new(transport)).with_config(cache_config))
}
