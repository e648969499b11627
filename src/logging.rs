//! Structured logging initialization.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the embedding binary. `RUST_LOG` takes precedence over the configured
//! level.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global tracing subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.level.as_str())
    };

    let registry = tracing_subscriber::registry().with(filter);
    match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => registry
            .with(fmt::layer().with_ansi(true).with_target(config.target))
            .try_init(),
        (LogFormat::Pretty, false) => registry
            .with(fmt::layer().with_ansi(true).with_target(config.target).without_time())
            .try_init(),
        (LogFormat::Json, true) => registry
            .with(fmt::layer().json().with_target(config.target))
            .try_init(),
        (LogFormat::Json, false) => registry
            .with(fmt::layer().json().with_target(config.target).without_time())
            .try_init(),
        (LogFormat::Compact, true) => registry
            .with(fmt::layer().compact().with_target(config.target))
            .try_init(),
        (LogFormat::Compact, false) => registry
            .with(fmt::layer().compact().with_target(config.target).without_time())
            .try_init(),
    }
}
