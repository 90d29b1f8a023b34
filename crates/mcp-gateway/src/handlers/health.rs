//! Health check handler.

/// Liveness probe handler.
///
/// Returns "OK" while the process is serving. Does not touch the identity
/// provider or the upstream, so a provider outage never restarts the pod.
pub async fn health_check() -> &'static str {
    "OK"
}
