//! Process-wide `tracing` subscriber.

use crate::config::LogFormat;
use crate::error::{Result, StorefrontError};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Events go to stderr so that CSV written to
/// stdout by the CLI stays machine-readable. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init(format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| StorefrontError::ConfigError(format!("Failed to install logger: {e}")))
}
