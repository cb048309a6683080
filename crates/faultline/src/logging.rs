//! Logger bootstrap for the binary
//!
//! Libraries only emit `tracing` events; the subscriber is installed here
//! once. `RUST_LOG` overrides the verbosity when set.

use crate::error::ConfigError;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Parse a verbosity name; empty means `info`
///
/// # Errors
/// Returns `ConfigError::InvalidVerbosity` for unknown names.
pub fn parse_verbosity(verbosity: &str) -> Result<LevelFilter, ConfigError> {
    match verbosity.trim().to_ascii_lowercase().as_str() {
        "" | "info" => Ok(LevelFilter::INFO),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(ConfigError::InvalidVerbosity(verbosity.to_string())),
    }
}

/// Install the global subscriber
///
/// # Errors
/// - `ConfigError::InvalidVerbosity` for unknown names
/// - `ConfigError::Logging` when a subscriber is already installed
pub fn init(verbosity: &str, format: LogFormat) -> Result<(), ConfigError> {
    let level = parse_verbosity(verbosity)?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_names() {
        assert_eq!(parse_verbosity("").unwrap(), LevelFilter::INFO);
        assert_eq!(parse_verbosity("DEBUG").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_verbosity(" warn ").unwrap(), LevelFilter::WARN);
        assert_eq!(
            parse_verbosity("loud").unwrap_err().to_string(),
            "invalid verbosity loud: expected one of trace, debug, info, warn, error"
        );
    }
}
