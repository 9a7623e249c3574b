//! Structured logging.
//!
//! Production deployments log JSON lines so the collector can index fields
//! like `request_id` and `user_key`; local runs use the pretty formatter.
//!
//! ```rust,ignore
//! use utilisync_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//! tracing::info!(path = "/api/users/get", "completed request");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Line format written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl LogOutput {
    /// Whether events are written as JSON.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// When false, [`init_logging`] installs nothing.
    pub enabled: bool,

    /// `EnvFilter` directive, e.g. `info` or `utilisync=debug,hyper=warn`.
    pub filter: String,

    /// Line format.
    pub output: LogOutput,

    /// Attach source file and line to each event.
    pub source_location: bool,

    /// Reported once the subscriber is installed.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Pretty output at debug level with source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            filter: "debug".to_string(),
            output: LogOutput::Pretty,
            source_location: true,
            ..Self::production()
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            filter: "info".to_string(),
            output: LogOutput::Json,
            source_location: false,
            service_name: crate::config::DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter is invalid or a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.filter)?;
    let base = fmt::layer()
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.output {
        LogOutput::Json => base.json().with_filter(filter).boxed(),
        LogOutput::Pretty => base.pretty().with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(service = %config.service_name, "logging initialized");
    Ok(())
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` naming the bad directive.
pub fn create_env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| TelemetryError::LoggingInit(format!("filter {directive:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LogConfig::default(), LogConfig::production());

        let dev = LogConfig::development();
        assert_eq!(dev.output, LogOutput::Pretty);
        assert!(dev.source_location);
        assert_eq!(dev.filter, "debug");

        let prod = LogConfig::production();
        assert!(prod.output.is_json());
        assert!(!prod.source_location);
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("utilisync=debug,hyper=warn").is_ok());

        let err = create_env_filter("utilisync=loud").expect_err("bad level");
        assert!(err.to_string().contains("utilisync=loud"));
    }

    #[test]
    fn test_disabled_logging_installs_nothing() {
        let config = LogConfig {
            enabled: false,
            filter: "not a directive ===".to_string(),
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
