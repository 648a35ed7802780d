//! Tracing subscriber bootstrap.

use crate::error::ClientError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "MAPCACHE_LOG";
pub const DEFAULT_FILTER: &str = "mapcache=info";

/// Install the global subscriber. Logs go to stderr so stdout stays JSON.
///
/// Call once at startup; a second call fails.
pub fn init_tracing(log_json: bool) -> Result<(), ClientError> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()
    };
    result.map_err(|e| ClientError::Telemetry(e.to_string()))
}
