//! Configuration schema types.
//!
//! Every section rejects unknown fields and fills missing ones from its
//! `default_*` function, so a partial file is always valid input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment environment.
///
/// `local`, `staging` and `production` run with real credentials. Anything
/// else is treated as development: a fixed signing key, no outbound email
/// and a constant temporary password.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Developer machine or test run.
    #[default]
    Development,
    /// Local deployment with real credentials.
    Local,
    /// Pre-production.
    Staging,
    /// Production.
    Production,
}

impl Environment {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Local => "local",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Returns `true` for environments that need real secrets.
    #[must_use]
    pub const fn requires_secrets(&self) -> bool {
        !matches!(self, Self::Development)
    }

    /// Parses an environment name. Unknown names mean development.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "local" => Self::Local,
            "staging" => Self::Staging,
            "production" => Self::Production,
            _ => Self::Development,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP server and lifecycle settings.
///
/// # Example
///
/// ```
/// use utilisync_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:8080".to_string(),
///     ..ServerConfig::default()
/// };
/// assert_eq!(config.api_prefix, "/api");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Path prefix for business routes.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Seconds between circuit breaker polls.
    #[serde(default = "default_circuit_breaker_wait")]
    pub circuit_breaker_wait_secs: u64,

    /// Consecutive failed polls tolerated while degraded.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Reject requests that did not arrive over HTTPS at the proxy.
    #[serde(default)]
    pub https_only: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            api_prefix: default_api_prefix(),
            circuit_breaker_wait_secs: default_circuit_breaker_wait(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            https_only: false,
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_circuit_breaker_wait() -> u64 {
    20
}

fn default_circuit_breaker_threshold() -> u32 {
    1
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30000
}

/// Token signing and expiry settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC key used to sign and verify bearer tokens.
    #[serde(default)]
    pub signing_key: String,

    /// Lifetime of a login token in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Lifetime of an override token in seconds.
    #[serde(default = "default_override_ttl")]
    pub override_ttl_secs: u64,

    /// Lifetime of a password reset token in seconds.
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_secs: u64,

    /// bcrypt work factor for stored passwords.
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            token_ttl_secs: default_token_ttl(),
            override_ttl_secs: default_override_ttl(),
            reset_token_ttl_secs: default_reset_token_ttl(),
            password_cost: default_password_cost(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_key", &redact(&self.signing_key))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("override_ttl_secs", &self.override_ttl_secs)
            .field("reset_token_ttl_secs", &self.reset_token_ttl_secs)
            .field("password_cost", &self.password_cost)
            .finish()
    }
}

fn default_token_ttl() -> u64 {
    24 * 60 * 60
}

fn default_override_ttl() -> u64 {
    4 * 60 * 60
}

fn default_reset_token_ttl() -> u64 {
    24 * 60 * 60
}

const fn default_password_cost() -> u32 {
    10
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "[redacted]"
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prometheus scrape listener address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,

    /// Histogram bucket boundaries for durations.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_metrics_addr(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_histogram_buckets() -> Vec<f64> {
    vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g., "info", "utilisync=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include file and line in log lines.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name reported in logs and metrics.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "utilisync".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.circuit_breaker_wait_secs, 20);
        assert_eq!(config.circuit_breaker_threshold, 1);
        assert!(!config.https_only);
    }

    #[test]
    fn test_auth_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.token_ttl_secs, 86_400);
        assert_eq!(config.override_ttl_secs, 14_400);
        assert_eq!(config.password_cost, 10);
        assert!(config.signing_key.is_empty());
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let auth = AuthConfig {
            signing_key: "hunter2".to_string(),
            ..AuthConfig::default()
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[redacted]"));
        assert!(debug.contains("password_cost: 10"));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("Staging"), Environment::Staging);
        assert_eq!(Environment::parse("local"), Environment::Local);
        assert_eq!(Environment::parse("qa"), Environment::Development);
        assert!(!Environment::Development.requires_secrets());
        assert!(Environment::Local.requires_secrets());
    }

    #[test]
    fn test_partial_server_section() {
        let config: ServerConfig =
            toml::from_str("circuit_breaker_threshold = 3").expect("partial section parses");
        assert_eq!(config.circuit_breaker_threshold, 3);
        assert_eq!(config.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str("max_connections = 10");
        assert!(result.is_err());
    }

    #[test]
    fn test_log_format_serialization() {
        let config: LoggingConfig = toml::from_str(r#"format = "pretty""#).expect("parses");
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
