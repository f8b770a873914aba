use crate::config::LoggingConfig;
use crate::error::{PayoutError, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Output goes to stderr
/// so that reports written to stdout stay machine-readable.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            PayoutError::Config(format!("invalid logging filter '{}': {}", config.filter, e))
        })?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt_layer.json()).try_init()
    } else {
        registry.with(fmt_layer.compact()).try_init()
    };
    installed.map_err(|e| PayoutError::Config(format!("failed to initialize tracing: {e}")))?;

    tracing::debug!(filter = %config.filter, json = config.json, "logging_initialized");
    Ok(())
}
