//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over `[logging] level`. Logs go to stderr so
//! they do not interleave with progress bars and command output on stdout.

use crate::config::LoggingConfig;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogFormat {
    /// Single-line human-readable format
    #[default]
    Compact,
    /// Multi-line human-readable format
    Pretty,
    /// One JSON object per event
    Json,
}

/// Install the global subscriber.
pub(crate) fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().with_target(false).try_init(),
    };
    installed.map_err(|e| e as Box<dyn std::error::Error>)
}
