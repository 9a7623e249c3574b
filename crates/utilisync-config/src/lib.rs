//! Typed configuration for Utilisync.
//!
//! - TOML and JSON configuration files
//! - `.env` files and `UTILISYNC__SECTION__KEY` environment overrides
//! - Strict parsing (unknown fields are errors)
//! - Validation after the last layer is applied
//!
//! # Configuration File Format
//!
//! ```toml
//! environment = "production"
//!
//! [server]
//! http_addr = "0.0.0.0:8080"
//! api_prefix = "/api"
//! circuit_breaker_wait_secs = 20
//! circuit_breaker_threshold = 1
//! https_only = true
//!
//! [auth]
//! signing_key = "change-me"
//! password_cost = 10
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```

#![doc(html_root_url = "https://docs.rs/utilisync-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{UtilisyncConfig, DEVELOPMENT_SIGNING_KEY};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    AuthConfig, Environment, LogFormat, LoggingConfig, MetricsConfig, ServerConfig,
    TelemetryConfigSection,
};
