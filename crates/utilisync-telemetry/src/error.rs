//! Telemetry setup failures.

use thiserror::Error;

/// Why logging or metrics could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus recorder or its listener could not be set up.
    #[error("metrics recorder: {0}")]
    MetricsInit(String),

    /// The filter directive is malformed or a subscriber already exists.
    #[error("log subscriber: {0}")]
    LoggingInit(String),

    /// The scrape listener address does not parse.
    #[error("bad listen address {0}")]
    InvalidAddress(String),
}
