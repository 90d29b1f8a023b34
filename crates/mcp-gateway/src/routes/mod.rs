//! HTTP routes for the gateway.
//!
//! Defines the Axum router and application state, and decides once at
//! startup whether `/mcp` sits behind bearer authentication.

use crate::auth::{HttpKeySource, JwksCache, JwtValidator};
use crate::config::{AuthSettings, Config};
use crate::handlers::{self, discovery::WELL_KNOWN_PATH, ProtectedResourceMetadata};
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::tools::ToolInvoker;
use axum::{
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Executes tool calls.
    pub tool_invoker: Arc<dyn ToolInvoker>,
}

/// Whether inbound tool calls are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Bearer tokens are required on `/mcp`.
    Protected(AuthSettings),

    /// No identity provider configured; `/mcp` is open.
    Open {
        /// Settings whose absence caused open mode.
        missing: Vec<&'static str>,
    },
}

impl AuthMode {
    pub fn from_config(config: &Config) -> Self {
        match config.auth_settings() {
            Some(settings) => AuthMode::Protected(settings),
            None => AuthMode::Open {
                missing: config.missing_auth_settings(),
            },
        }
    }
}

/// Preflight responses for `/mcp`.
async fn mcp_preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [(header::ALLOW, "POST, OPTIONS")])
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/mcp` - JSON-RPC tool calls - bearer auth when protected
/// - `/` and `/.well-known/oauth-protected-resource[/mcp]` - discovery
///   metadata, public, only when protected
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let mode = AuthMode::from_config(&state.config);

    // Operational routes are public in both modes
    let health_routes = Router::new().route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let mcp_routes = Router::new()
        .route(
            "/mcp",
            post(handlers::mcp_handler).options(mcp_preflight),
        )
        .route(
            "/mcp/",
            post(handlers::mcp_handler).options(mcp_preflight),
        );

    let app_routes = match &mode {
        AuthMode::Protected(settings) => {
            tracing::info!(
                target: "gw.routes",
                domain = %settings.domain,
                audience = %settings.audience,
                discovery_url = %format!("{}{}", settings.base_url, WELL_KNOWN_PATH),
                "Authentication enabled"
            );

            let auth_state = Arc::new(build_auth_state(settings));
            let metadata = Arc::new(ProtectedResourceMetadata::from_settings(
                settings,
                &state.config,
            ));

            let discovery_routes = Router::new()
                .route("/", get(handlers::discovery_handler))
                .route(WELL_KNOWN_PATH, get(handlers::discovery_handler))
                .route(
                    &format!("{WELL_KNOWN_PATH}/mcp"),
                    get(handlers::discovery_handler),
                )
                .with_state(metadata);

            let protected_routes = mcp_routes
                .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
                .with_state(state);

            discovery_routes.merge(protected_routes)
        }
        AuthMode::Open { missing } => {
            tracing::warn!(
                target: "gw.routes",
                missing = ?missing,
                "Identity provider not configured - running WITHOUT authentication"
            );
            mcp_routes.with_state(state)
        }
    };

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    app_routes
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// Wire key source, cache and validator for a configured identity provider.
///
/// Performs no network I/O; keys are fetched on the first authenticated
/// request.
fn build_auth_state(settings: &AuthSettings) -> AuthState {
    let key_source = Arc::new(HttpKeySource::new(
        settings.jwks_url.clone(),
        settings.jwks_fetch_timeout,
    ));
    let jwks = Arc::new(JwksCache::new(key_source));
    let validator = Arc::new(JwtValidator::new(
        jwks,
        settings.audience.clone(),
        settings.issuer.clone(),
        settings.leeway_seconds,
    ));
    AuthState::new(validator)
}
