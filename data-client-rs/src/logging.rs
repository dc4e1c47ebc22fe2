//! # Structured Logging
//!
//! Installs a `tracing` subscriber for binaries that embed the client. The
//! client itself only emits events; installing a subscriber is optional.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::error::{Result, ServiceError};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable text
    pub json_format: bool,

    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            with_target: true,
        }
    }
}

/// Initializes the structured logging system.
///
/// A second call, or a call after another subscriber was installed
/// elsewhere, is a no-op.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            LOGGING_INITIALIZED.store(false, Ordering::SeqCst);
            ServiceError::configuration(format!("Invalid log level {}: {}", config.level, e))
        })?,
    };

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(config.with_target)
    });
    let text_layer = (!config.json_format).then(|| fmt::layer().with_target(config.with_target));

    if Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed, keeping it");
    }

    Ok(())
}
