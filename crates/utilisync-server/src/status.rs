//! Liveness report served at the status path.

use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;

use crate::lifecycle::ServerState;

/// Body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Current lifecycle state.
    pub state: ServerState,
    /// Time since the server was constructed, see [`format_uptime`].
    pub uptime: String,
}

impl StatusReport {
    /// Builds a report for `state` after `uptime`.
    #[must_use]
    pub fn new(state: ServerState, uptime: Duration) -> Self {
        Self {
            state,
            uptime: format_uptime(uptime),
        }
    }
}

/// Renders a duration truncated to milliseconds, e.g. `0s`, `12ms`, `3.5s`,
/// `1m0.5s`, `1h2m3.456s`.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let total_ms = uptime.as_millis();
    if total_ms == 0 {
        return "0s".to_string();
    }
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{seconds}");
    if millis > 0 {
        let fraction = format!("{millis:03}");
        let _ = write!(out, ".{}", fraction.trim_end_matches('0'));
    }
    out.push('s');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::ZERO), "0s");
        assert_eq!(format_uptime(Duration::from_micros(900)), "0s");
        assert_eq!(format_uptime(Duration::from_millis(12)), "12ms");
        assert_eq!(format_uptime(Duration::from_millis(3500)), "3.5s");
        assert_eq!(format_uptime(Duration::from_secs(7)), "7s");
        assert_eq!(format_uptime(Duration::from_millis(60_500)), "1m0.5s");
        assert_eq!(format_uptime(Duration::from_millis(3_723_456)), "1h2m3.456s");
        assert_eq!(format_uptime(Duration::from_secs(3600)), "1h0m0s");
    }

    #[test]
    fn test_truncates_sub_millisecond() {
        assert_eq!(format_uptime(Duration::from_micros(3_500_999)), "3.5s");
        assert_eq!(format_uptime(Duration::from_nanos(12_999_999)), "12ms");
    }

    #[test]
    fn test_report_serialization() {
        let report = StatusReport::new(ServerState::Ready, Duration::from_millis(1500));
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"state":"ready","uptime":"1.5s"}"#);
    }
}
