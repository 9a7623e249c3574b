//! # Utilisync Telemetry
//!
//! Structured logging (`tracing` + `tracing-subscriber`) and Prometheus
//! metrics (`metrics` + `metrics-exporter-prometheus`) for the Utilisync
//! service.
//!
//! # Example
//!
//! ```rust,ignore
//! use utilisync_telemetry::{init_telemetry, LogConfig, TelemetryConfig};
//!
//! let config = TelemetryConfig::new("utilisync", "production")
//!     .with_logging(LogConfig::production());
//! init_telemetry(&config)?;
//! ```

#![doc(html_root_url = "https://docs.rs/utilisync-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogOutput};
pub use metrics::{init_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging first, then metrics. Must run inside a tokio runtime
/// when metrics are enabled.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        "telemetry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_with_everything_disabled() {
        let mut config = TelemetryConfig::default();
        config.logging.enabled = false;
        config.metrics.enabled = false;
        assert!(init_telemetry(&config).is_ok());
    }
}
