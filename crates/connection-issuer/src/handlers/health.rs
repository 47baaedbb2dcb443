//! Liveness probe.

/// Handler for GET /health
///
/// Returns "OK" while the process is serving requests. Neither the token
/// backend nor the media server is checked.
pub async fn health_check() -> &'static str {
    "OK"
}
