//! Metrics definitions for the gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gw_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: fixed set of routes, everything else is `/other`
//! - `status`: success, error, timeout
//! - `error_type`: bounded by `TokenError` variants
//! - `result`: hit, miss

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
            Matcher::Prefix("gw_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetch is bounded by the fetch timeout (at most 30s)
        .set_buckets_for_metric(
            Matcher::Prefix("gw_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gw_tool_call".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000],
        )
        .map_err(|e| format!("Failed to set tool call buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gw_http_requests_total`, `gw_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gw_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gw_http_requests_total",
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

/// Map a request path onto the fixed set of routes.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/mcp" | "/mcp/" => "/mcp",
        "/.well-known/oauth-protected-resource" => "/.well-known/oauth-protected-resource",
        "/.well-known/oauth-protected-resource/mcp" => {
            "/.well-known/oauth-protected-resource/mcp"
        }
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record a token validation outcome
///
/// Metric: `gw_token_validations_total`
/// Labels: `status` (success, error), `error_type` (none, missing, malformed,
/// invalid, expired)
pub fn record_token_validation(status: &'static str, error_type: &'static str) {
    counter!("gw_token_validations_total",
        "status" => status,
        "error_type" => error_type
    )
    .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS fetch
///
/// Metric: `gw_jwks_fetches_total`, `gw_jwks_fetch_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("gw_jwks_fetch_duration_seconds").record(duration.as_secs_f64());

    counter!("gw_jwks_fetches_total",
        "status" => status
    )
    .increment(1);
}

/// Record a key cache lookup
///
/// Metric: `gw_jwks_cache_total`
/// Labels: `result` (hit, miss)
pub fn record_jwks_cache(result: &'static str) {
    counter!("gw_jwks_cache_total",
        "result" => result
    )
    .increment(1);
}

// ============================================================================
// Tool Call Metrics
// ============================================================================

/// Record a forwarded tool call
///
/// Metric: `gw_tool_calls_total`, `gw_tool_call_duration_seconds`
/// Labels: `status` (success, error)
///
/// Tool names are not used as labels; the catalog is owned by the upstream.
pub fn record_tool_call(status: &'static str, duration: Duration) {
    histogram!("gw_tool_call_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gw_tool_calls_total",
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    type Snapshot = Vec<(
        metrics_util::CompositeKey,
        Option<metrics::Unit>,
        Option<metrics::SharedString>,
        DebugValue,
    )>;

    fn counter_value(snapshot: &Snapshot, name: &str, label: (&str, &str)) -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .filter(|(key, _, _, _)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1)
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => *v,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("POST", "/mcp", 401, Duration::from_millis(3));
        record_http_request("GET", "/does/not/exist", 404, Duration::from_millis(1));
        record_http_request("POST", "/mcp", 408, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/"), "/");
        assert_eq!(normalize_endpoint("/mcp"), "/mcp");
        assert_eq!(normalize_endpoint("/mcp/"), "/mcp");
        assert_eq!(
            normalize_endpoint("/.well-known/oauth-protected-resource"),
            "/.well-known/oauth-protected-resource"
        );
        assert_eq!(normalize_endpoint("/admin"), "/other");
        assert_eq!(normalize_endpoint("/mcp/../etc/passwd"), "/other");
    }

    #[test]
    fn test_token_and_jwks_counters() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_token_validation("success", "none");
            record_token_validation("error", "expired");
            record_token_validation("error", "expired");
            record_jwks_cache("hit");
            record_jwks_cache("miss");
            record_jwks_fetch("success", Duration::from_millis(20));
            record_tool_call("success", Duration::from_millis(40));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(
                &snapshot,
                "gw_token_validations_total",
                ("error_type", "expired")
            ),
            2
        );
        assert_eq!(
            counter_value(&snapshot, "gw_jwks_cache_total", ("result", "hit")),
            1
        );
        assert_eq!(
            counter_value(&snapshot, "gw_jwks_fetches_total", ("status", "success")),
            1
        );
        assert_eq!(
            counter_value(&snapshot, "gw_tool_calls_total", ("status", "success")),
            1
        );
    }
}
