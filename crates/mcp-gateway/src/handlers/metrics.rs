//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! Labels carry no subjects, tokens or tool arguments.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus-formatted metrics for scraping:
/// ```text
/// # TYPE gw_token_validations_total counter
/// gw_token_validations_total{status="error",error_type="expired"} 3
/// ```
#[tracing::instrument(skip_all, name = "gw.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
