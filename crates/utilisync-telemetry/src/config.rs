//! Combined logging and metrics settings.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Service name used when none is given.
pub const DEFAULT_SERVICE_NAME: &str = "utilisync";

/// Settings handed to [`crate::init_telemetry`].
///
/// The service name is owned here and mirrored into both subsystems by
/// [`TelemetryConfig::new`] and the `with_*` setters, so the startup lines
/// from logging and metrics always agree.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Name reported in startup logs.
    pub service_name: String,

    /// Deployment environment label (`development`, `staging`, ...).
    pub environment: String,

    /// Prometheus settings.
    pub metrics: MetricsConfig,

    /// Subscriber settings.
    pub logging: LogConfig,
}

impl TelemetryConfig {
    /// Production logging and default metrics for `service_name`.
    #[must_use]
    pub fn new(service_name: &str, environment: &str) -> Self {
        let mut config = Self {
            service_name: service_name.to_string(),
            environment: environment.to_string(),
            metrics: MetricsConfig::default(),
            logging: LogConfig::production(),
        };
        config.sync_service_name();
        config
    }

    /// Replaces the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self.sync_service_name();
        self
    }

    /// Replaces the metrics settings.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = metrics;
        self.sync_service_name();
        self
    }

    fn sync_service_name(&mut self) {
        self.logging.service_name.clone_from(&self.service_name);
        self.metrics.service_name.clone_from(&self.service_name);
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME, "development")
    }
}
