//! Tracing subscriber setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use workbridge_domain::{ConnectionError, LoggingSettings, Result};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `settings.level`. Returns `Ok(false)` when a global
/// subscriber is already installed, so hosts and tests may call it freely.
///
/// # Errors
/// Returns `ConnectionError::Config` for an invalid filter directive.
pub fn init_tracing(settings: &LoggingSettings) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| {
            ConnectionError::Config(format!("Invalid log filter '{}': {e}", settings.level))
        })?,
    };

    let installed = if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).flatten_event(true))
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).try_init().is_ok()
    };

    if installed {
        tracing::info!(level = %settings.level, json = settings.json, "Logging initialized");
    }
    Ok(installed)
}
