//! Structured logging configuration.
//!
//! Always logs to stderr; when file logging is enabled, a second plain-text
//! layer appends to the configured log file. Log-file problems downgrade to
//! a warning so they cannot prevent startup.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServerConfig;

/// Initialize the tracing subscriber from the resolved configuration.
///
/// Log levels are controlled via the `RUST_LOG` environment variable and
/// default to `info`.
pub fn init(config: &ServerConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file_layer = if config.enable_file_logging {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
        {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            ),
            Err(error) => {
                eprintln!(
                    "warning: could not open log file {}: {error}; logging to stderr only",
                    config.log_file
                );
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
