//! Server configuration types.
//!
//! # Example
//!
//! ```rust
//! use utilisync_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_addr("127.0.0.1:8080")
//!     .circuit_breaker_wait(Duration::from_secs(5))
//!     .build();
//!
//! assert_eq!(config.http_addr(), "127.0.0.1:8080");
//! assert_eq!(config.api_prefix(), "/api");
//! ```

use std::net::SocketAddr;
use std::time::Duration;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Prefix under which business routes are mounted.
pub const DEFAULT_API_PREFIX: &str = "/api";

/// Liveness path answered in every state.
pub const DEFAULT_STATUS_PATH: &str = "/health/GetStatus";

/// Consecutive failed polls tolerated while degraded.
pub const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 1;

/// Time between circuit breaker polls.
pub const DEFAULT_CIRCUIT_BREAKER_WAIT: Duration = Duration::from_secs(20);

/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    http_addr: String,
    api_prefix: String,
    status_path: String,
    circuit_breaker_wait: Duration,
    circuit_breaker_threshold: u32,
    shutdown_timeout: Duration,
    request_timeout: Duration,
}

impl ServerConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// HTTP bind address.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Parses the bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.http_addr.parse()
    }

    /// Prefix for business routes.
    #[must_use]
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Liveness path.
    #[must_use]
    pub fn status_path(&self) -> &str {
        &self.status_path
    }

    /// Time between circuit breaker polls.
    #[must_use]
    pub fn circuit_breaker_wait(&self) -> Duration {
        self.circuit_breaker_wait
    }

    /// Consecutive failed polls tolerated while degraded.
    #[must_use]
    pub fn circuit_breaker_threshold(&self) -> u32 {
        self.circuit_breaker_threshold
    }

    /// Time allowed for in-flight connections after Stop.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Upper bound for reading a body and for running a route.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    http_addr: String,
    api_prefix: String,
    status_path: String,
    circuit_breaker_wait: Duration,
    circuit_breaker_threshold: u32,
    shutdown_timeout: Duration,
    request_timeout: Duration,
}

impl ServerConfigBuilder {
    /// Creates a builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            status_path: DEFAULT_STATUS_PATH.to_string(),
            circuit_breaker_wait: DEFAULT_CIRCUIT_BREAKER_WAIT,
            circuit_breaker_threshold: DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Sets the business route prefix. A trailing `/` is dropped.
    #[must_use]
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.api_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    /// Sets the liveness path.
    #[must_use]
    pub fn status_path(mut self, path: impl Into<String>) -> Self {
        self.status_path = path.into();
        self
    }

    /// Sets the time between circuit breaker polls.
    #[must_use]
    pub fn circuit_breaker_wait(mut self, wait: Duration) -> Self {
        self.circuit_breaker_wait = wait;
        self
    }

    /// Sets the failure threshold. Zero is raised to one.
    #[must_use]
    pub fn circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = threshold.max(1);
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            http_addr: self.http_addr,
            api_prefix: self.api_prefix,
            status_path: self.status_path,
            circuit_breaker_wait: self.circuit_breaker_wait,
            circuit_breaker_threshold: self.circuit_breaker_threshold,
            shutdown_timeout: self.shutdown_timeout,
            request_timeout: self.request_timeout,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
