//! Top-level configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{AuthConfig, ConfigError, Environment, LogFormat, ServerConfig, TelemetryConfigSection};

/// Signing key used in development when none is configured.
pub const DEVELOPMENT_SIGNING_KEY: &str = "test";

const MIN_PASSWORD_COST: u32 = 4;
const MAX_PASSWORD_COST: u32 = 31;

/// Complete Utilisync configuration.
///
/// # Example
///
/// ```
/// use utilisync_config::{Environment, UtilisyncConfig};
///
/// let config = UtilisyncConfig::default();
/// assert_eq!(config.environment, Environment::Development);
/// assert_eq!(config.signing_key(), "test");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct UtilisyncConfig {
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// HTTP server and lifecycle settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl UtilisyncConfig {
    /// Returns the signing key, falling back to the development key when
    /// none is configured outside the secret-bearing environments.
    #[must_use]
    pub fn signing_key(&self) -> &str {
        if self.auth.signing_key.is_empty() && !self.environment.requires_secrets() {
            DEVELOPMENT_SIGNING_KEY
        } else {
            &self.auth.signing_key
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` or `ConfigError::Required`
    /// describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if !self.server.api_prefix.starts_with('/') {
            return Err(ConfigError::invalid(
                "server.api_prefix",
                "must start with '/'",
            ));
        }

        if self.server.circuit_breaker_threshold == 0 {
            return Err(ConfigError::invalid(
                "server.circuit_breaker_threshold",
                "must be at least 1",
            ));
        }

        if self.server.circuit_breaker_wait_secs == 0 {
            return Err(ConfigError::invalid(
                "server.circuit_breaker_wait_secs",
                "must be at least 1",
            ));
        }

        if self.telemetry.metrics.enabled
            && self
                .telemetry
                .metrics
                .addr
                .parse::<SocketAddr>()
                .is_err()
        {
            return Err(ConfigError::invalid(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        if !(MIN_PASSWORD_COST..=MAX_PASSWORD_COST).contains(&self.auth.password_cost) {
            return Err(ConfigError::invalid(
                "auth.password_cost",
                format!("must be between {MIN_PASSWORD_COST} and {MAX_PASSWORD_COST}"),
            ));
        }

        if self.environment.requires_secrets() && self.auth.signing_key.is_empty() {
            return Err(ConfigError::required("auth.signing_key"));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, no metrics listener.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Development;
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.telemetry.metrics.enabled = false;
        config
    }

    /// Production preset: JSON logs, metrics on, HTTPS enforced. A signing
    /// key must still be supplied before it validates.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Production;
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.server.https_only = true;
        config
    }
}
