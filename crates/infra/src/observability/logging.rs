//! `tracing` subscriber setup

use layercache_domain::constants::SERVICE_NAME;
use layercache_domain::{CacheError, CacheResult, LoggingSettings};
use tracing::Span;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` wins over `settings.level` when it is set and parses. Returns
/// `false` when a subscriber was already installed, which leaves the
/// existing one in place.
///
/// # Errors
/// Returns `CacheError::Config` if neither `RUST_LOG` nor `settings.level`
/// is a valid filter directive.
pub fn init_logging(settings: &LoggingSettings) -> CacheResult<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| {
            CacheError::config(format!("invalid log level '{}': {e}", settings.level))
        })?,
    };

    let json = settings.json.then(|| fmt::layer().json().with_current_span(true));
    let pretty = (!settings.json).then(|| fmt::layer().with_target(true));

    let installed = tracing_subscriber::registry().with(filter).with(json).with(pretty).try_init().is_ok();
    if installed {
        tracing::debug!(level = %settings.level, json = settings.json, "logging initialised");
    }
    Ok(installed)
}

/// Root span carrying `service = "cache-layer"`; instrument top-level tasks
/// with it so every record names the service
pub fn service_span() -> Span {
    tracing::info_span!("service", service = SERVICE_NAME)
}
