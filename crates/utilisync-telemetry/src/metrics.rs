//! Prometheus metrics.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `utilisync_requests_total` | Counter | `route`, `status` | Dispatched HTTP requests |
//! | `utilisync_request_duration_seconds` | Histogram | `route` | Dispatch latency |
//! | `utilisync_in_flight_requests` | Gauge | - | Requests being processed |
//! | `utilisync_endpoint_duration_seconds` | Histogram | `route` | Endpoint (business logic) latency |
//! | `utilisync_endpoint_errors_total` | Counter | `route`, `kind` | Endpoint failures by error kind |
//! | `utilisync_server_state` | Gauge | `state` | 1 for the current lifecycle state |
//! | `utilisync_probe_failures_total` | Counter | `probe` | Failed circuit breaker probes |
//!
//! Recording functions are no-ops until [`init_metrics`] installs a recorder.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::runtime::Handle;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Every lifecycle state label, so a transition can zero the others.
pub const SERVER_STATES: [&str; 5] = ["unstarted", "starting", "ready", "live", "stopping"];

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address of the Prometheus scrape listener.
    pub addr: String,

    /// Service name, reported in the startup log.
    pub service_name: String,

    /// Histogram buckets for the `*_duration_seconds` metrics.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
            service_name: "utilisync".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and spawns its scrape listener on the
/// current tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for a bad listen address and
/// `TelemetryError::MetricsInit` when called outside a runtime, when the
/// listener cannot bind, or when a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let runtime = Handle::try_current().map_err(|_| {
        TelemetryError::MetricsInit("the scrape listener needs a tokio runtime".to_string())
    })?;

    let mut builder = PrometheusBuilder::new().with_http_listener(addr);
    if !config.duration_buckets.is_empty() {
        builder = builder
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &config.duration_buckets,
            )
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    let (recorder, exporter) = {
        let _entered = runtime.enter();
        builder
            .build()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
    };
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).map_err(|_| {
        TelemetryError::MetricsInit("a metrics recorder is already installed".to_string())
    })?;

    runtime.spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "metrics listener failed");
        }
    });

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    tracing::info!(service = %config.service_name, %addr, "metrics listener started");
    Ok(())
}

/// Renders metrics in Prometheus text format, if a recorder is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "utilisync_requests_total",
        "Total number of HTTP requests dispatched"
    );
    describe_histogram!(
        "utilisync_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "utilisync_in_flight_requests",
        "Number of HTTP requests currently being processed"
    );
    describe_histogram!(
        "utilisync_endpoint_duration_seconds",
        "Endpoint execution time in seconds"
    );
    describe_counter!(
        "utilisync_endpoint_errors_total",
        "Endpoint failures by error kind"
    );
    describe_gauge!(
        "utilisync_server_state",
        "Current server lifecycle state (1 = active)"
    );
    describe_counter!(
        "utilisync_probe_failures_total",
        "Failed circuit breaker probe runs"
    );
}

/// Records a dispatched request.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        "utilisync_requests_total",
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "utilisync_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records how long an endpoint took.
pub fn record_endpoint(route: &str, duration: Duration) {
    histogram!(
        "utilisync_endpoint_duration_seconds",
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records an endpoint failure.
pub fn record_endpoint_error(route: &str, kind: &str) {
    counter!(
        "utilisync_endpoint_errors_total",
        "route" => route.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Marks `state` as the current lifecycle state.
pub fn record_server_state(state: &str) {
    for label in SERVER_STATES {
        let value = if label == state { 1.0 } else { 0.0 };
        gauge!("utilisync_server_state", "state" => label).set(value);
    }
}

/// Records a failed probe run.
pub fn record_probe_failure(probe: &str) {
    counter!(
        "utilisync_probe_failures_total",
        "probe" => probe.to_string()
    )
    .increment(1);
}

/// Keeps `utilisync_in_flight_requests` incremented while alive.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("utilisync_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("utilisync_in_flight_requests").decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.addr, "0.0.0.0:9090");
        assert!(!config.duration_buckets.is_empty());
    }

    #[test]
    fn test_disabled_metrics_skip_install() {
        let config = MetricsConfig {
            enabled: false,
            addr: "not an address".to_string(),
            ..MetricsConfig::default()
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            addr: "not an address".to_string(),
            ..MetricsConfig::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_requires_runtime() {
        let config = MetricsConfig {
            addr: "127.0.0.1:0".to_string(),
            ..MetricsConfig::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::MetricsInit(_))
        ));
    }

    #[tokio::test]
    async fn test_listener_serves_scrapes() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = MetricsConfig {
            addr: format!("127.0.0.1:{port}"),
            ..MetricsConfig::default()
        };
        init_metrics(&config).unwrap();
        record_probe_failure("user-store");

        let mut stream = None;
        for _ in 0..50 {
            if let Ok(s) = TcpStream::connect(("127.0.0.1", port)).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let mut stream = stream.expect("metrics listener accepts connections");
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();

        assert!(body.starts_with("HTTP/1.1 200"));
        assert!(body.contains("utilisync_probe_failures_total"));
        assert!(render_metrics().is_some());
    }

    #[test]
    fn test_record_functions_without_recorder() {
        record_request("/users/get", 200, Duration::from_millis(10));
        record_endpoint("/users/get", Duration::from_millis(4));
        record_endpoint_error("/users/get", "bad_request");
        record_server_state("ready");
        record_probe_failure("user-store");
        let guard = InFlightGuard::new();
        drop(guard);
    }

    #[test]
    fn test_server_states_cover_lifecycle() {
        assert!(SERVER_STATES.contains(&"live"));
        assert!(SERVER_STATES.contains(&"stopping"));
    }
}
