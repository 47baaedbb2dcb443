//! HTTP routes for the connection issuer.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics::http_metrics_middleware;
use crate::services::delegate_client::DelegateClient;
use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

/// Value of `Access-Control-Allow-Origin`.
pub const CORS_ALLOW_ORIGIN: &str = "*";

/// Value of `Access-Control-Allow-Methods`.
pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Value of `Access-Control-Allow-Headers`.
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Client for the delegated token backend.
    pub delegate: DelegateClient,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/connection-details` and `/api/connection-details` - GET issues a
///   descriptor, OPTIONS answers preflight
/// - `/health` - Liveness probe (simple "OK")
/// - `/metrics` - Prometheus metrics endpoint
/// - CORS headers on every response
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout from configuration
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_seconds);

    let api_routes = Router::new()
        .route(
            "/connection-details",
            get(handlers::get_connection_details).options(handlers::preflight),
        )
        .route(
            "/api/connection-details",
            get(handlers::get_connection_details).options(handlers::preflight),
        )
        .route("/health", get(handlers::health_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. CORS headers - stamped on every response, including 404/408
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    api_routes
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(CORS_ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = Config::from_vars(&HashMap::from([
            ("LIVEKIT_URL".to_string(), "wss://media.example.com".to_string()),
            ("LIVEKIT_API_KEY".to_string(), "APIkey".to_string()),
            ("LIVEKIT_API_SECRET".to_string(), "secret".to_string()),
        ]))
        .unwrap();
        let delegate = DelegateClient::new(config.backend_api_url.clone()).unwrap();
        let handle = PrometheusBuilder::new().build_recorder().handle();

        build_routes(Arc::new(AppState { config, delegate }), handle)
    }

    fn assert_cors(response: &axum::response::Response) {
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            CORS_ALLOW_ORIGIN
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            CORS_ALLOW_METHODS
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            CORS_ALLOW_HEADERS
        );
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_preflight_on_both_paths() {
        for path in ["/connection-details", "/api/connection-details"] {
            let request = Request::builder()
                .method("OPTIONS")
                .uri(path)
                .body(Body::empty())
                .unwrap();

            let response = test_router().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_cors(&response);
        }
    }

    #[tokio::test]
    async fn test_cors_on_validation_error() {
        let request = Request::builder()
            .uri("/connection-details?participantName=alice")
            .body(Body::empty())
            .unwrap();

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_cors(&response);
    }

    #[tokio::test]
    async fn test_cors_on_not_found() {
        let request = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_cors(&response);
    }

    #[tokio::test]
    async fn test_health_route() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
