//! Metrics definitions for the connection issuer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `issuer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: 5 values (known paths plus `/other`)
//! - `mode`: 2 values (livekit, custom)
//! - `status`: 3 values (success, error, timeout)
//! - `error_type`: bounded by `IssuerError` variants
//!
//! Room names, participant names and identities are never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("issuer_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Local signing is sub-millisecond; delegated issuance includes a network hop
        .set_buckets_for_metric(
            Matcher::Prefix("issuer_token_issuance".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
                10.000,
            ],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("issuer_delegate_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set delegate request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `issuer_http_requests_total`, `issuer_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures every response, including 404/405 produced by the router itself.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("issuer_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("issuer_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to bound label cardinality.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/connection-details" => "/connection-details",
        "/api/connection-details" => "/api/connection-details",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Token Issuance Metrics
// ============================================================================

/// Record a connection-details issuance.
///
/// Metric: `issuer_token_issuance_total`, `issuer_token_issuance_duration_seconds`
/// Labels: `mode`, `status`
///
/// Mode: "livekit" (direct signing), "custom" (delegated)
/// Status: "success", "error"
pub fn record_token_issuance(mode: &str, status: &str, duration: Duration) {
    histogram!("issuer_token_issuance_duration_seconds",
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("issuer_token_issuance_total",
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Delegate Backend Metrics
// ============================================================================

/// Record a call to the delegated token backend.
///
/// Metric: `issuer_delegate_requests_total`, `issuer_delegate_request_duration_seconds`
/// Labels: `status`
///
/// Status: "success", "error" (non-2xx), "unavailable" (transport failure)
pub fn record_delegate_request(status: &str, duration: Duration) {
    histogram!("issuer_delegate_request_duration_seconds").record(duration.as_secs_f64());

    counter!("issuer_delegate_requests_total",
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category.
///
/// Metric: `issuer_errors_total`
/// Labels: `error_type`, `status_code`
pub fn record_error(error_type: &str, status_code: u16) {
    counter!("issuer_errors_total",
        "error_type" => error_type.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // These execute the recording functions against the no-op recorder that
    // the metrics crate uses when nothing is installed.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/connection-details", 200, Duration::from_millis(5));
        record_http_request(
            "GET",
            "/api/connection-details",
            400,
            Duration::from_millis(1),
        );
        record_http_request("OPTIONS", "/connection-details", 200, Duration::from_millis(1));
        record_http_request("GET", "/health", 200, Duration::from_millis(1));
        record_http_request("GET", "/nope", 404, Duration::from_millis(1));
        record_http_request("GET", "/connection-details", 408, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(404), "error");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(
            normalize_endpoint("/connection-details"),
            "/connection-details"
        );
        assert_eq!(
            normalize_endpoint("/api/connection-details"),
            "/api/connection-details"
        );
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/"), "/other");
        assert_eq!(normalize_endpoint("/connection-details/extra"), "/other");
        assert_eq!(normalize_endpoint("/rooms/abcd-efgh"), "/other");
    }

    #[test]
    fn test_record_token_issuance() {
        record_token_issuance("livekit", "success", Duration::from_micros(300));
        record_token_issuance("custom", "error", Duration::from_millis(120));
    }

    #[test]
    fn test_record_delegate_request() {
        record_delegate_request("success", Duration::from_millis(40));
        record_delegate_request("error", Duration::from_millis(40));
        record_delegate_request("unavailable", Duration::from_secs(10));
    }

    #[test]
    fn test_record_error() {
        record_error("invalid_region", 500);
        record_error("missing_parameter", 400);
    }
}
