//! Authentication middleware for protected routes.
//!
//! Extracts the bearer token from the Authorization header, verifies it, and
//! injects the resulting `Claims` into request extensions. Rejections never
//! reach the wrapped handler.

use crate::auth::{Claims, JwtValidator, TokenError};
use crate::errors::GatewayError;
use crate::observability::metrics::record_token_validation;
use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// JWT validator with JWKS cache.
    pub jwt_validator: Arc<JwtValidator>,

    /// Realm advertised in `WWW-Authenticate` challenges.
    pub realm: String,
}

impl AuthState {
    /// Realm defaults to the validator's audience.
    pub fn new(jwt_validator: Arc<JwtValidator>) -> Self {
        let realm = jwt_validator.audience().to_string();
        Self {
            jwt_validator,
            realm,
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-sensitively with exactly one space.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Authentication middleware.
///
/// # Response
///
/// - `OPTIONS` requests pass through untouched
/// - 401 `invalid_request` if the header is missing or not a bearer credential
/// - 401 `invalid_token` if the token is expired or fails verification
/// - Continues to next handler with `Claims` in extensions if token is valid
#[instrument(skip_all, name = "gw.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    // Preflight requests carry no credentials
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let Some(token) = extract_bearer_token(&req) else {
        tracing::debug!(target: "gw.middleware.auth", "Missing or non-bearer Authorization header");
        record_token_validation("error", "missing");
        return Err(GatewayError::MissingCredentials {
            realm: state.realm.clone(),
        });
    };

    let claims = match state.jwt_validator.verify(token).await {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            tracing::info!(target: "gw.middleware.auth", "Rejected expired token");
            return Err(GatewayError::TokenExpired {
                realm: state.realm.clone(),
            });
        }
        Err(e) => {
            tracing::warn!(target: "gw.middleware.auth", reason = %e, "Token validation failed");
            return Err(GatewayError::InvalidToken {
                realm: state.realm.clone(),
            });
        }
    };

    // Store claims in request extensions for downstream handlers
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::http::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{Jwk, JwksCache, JwksError, KeySource};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use gateway_test_utils::crypto_fixtures::{test_keypair, test_keypair_2};
    use gateway_test_utils::token_builders::TestTokenBuilder;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct FixtureSource;

    #[async_trait]
    impl KeySource for FixtureSource {
        async fn fetch(&self) -> Result<Vec<Jwk>, JwksError> {
            let jwk = test_keypair().jwk_json();
            Ok(vec![serde_json::from_value(jwk).unwrap()])
        }
    }

    async fn echo_subject(req: Request) -> String {
        req.claims()
            .map(|c| c.sub.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn test_app() -> Router {
        let cache = Arc::new(JwksCache::new(Arc::new(FixtureSource)));
        let validator = Arc::new(JwtValidator::new(cache, "svc", "https://idp.test/", 0));
        let auth_state = Arc::new(AuthState::new(validator));

        Router::new()
            .route("/mcp", post(echo_subject).options(|| async { "preflight" }))
            .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
    }

    fn request(method: &str, authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method(method).uri("/mcp");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler_with_claims() {
        let token = TestTokenBuilder::new()
            .for_subject("auth0|alice")
            .sign(&test_keypair());

        let response = test_app()
            .oneshot(request("POST", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "auth0|alice");
    }

    #[tokio::test]
    async fn test_missing_header_is_invalid_request() {
        let response = test_app().oneshot(request("POST", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("www-authenticate").unwrap(),
            "Bearer realm=\"svc\""
        );
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(
            body["error_description"],
            "Missing or invalid Authorization header"
        );
    }

    #[tokio::test]
    async fn test_non_bearer_schemes_are_invalid_request() {
        for value in ["Basic dXNlcjpwYXNz", "bearer abc", "Bearer", "BearerX abc"] {
            let response = test_app()
                .oneshot(request("POST", Some(value)))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                body_json(response).await["error"],
                "invalid_request",
                "{value:?} should be rejected as invalid_request"
            );
        }
    }

    #[tokio::test]
    async fn test_expired_token_message() {
        let token = TestTokenBuilder::new().expires_in(-10).sign(&test_keypair());

        let response = test_app()
            .oneshot(request("POST", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("www-authenticate").unwrap(),
            "Bearer realm=\"svc\", error=\"invalid_token\""
        );
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_token");
        assert_eq!(body["error_description"], "Token has expired");
    }

    #[tokio::test]
    async fn test_invalid_tokens_get_generic_message() {
        let wrong_audience = TestTokenBuilder::new()
            .with_audience("other")
            .sign(&test_keypair());
        let unknown_key = TestTokenBuilder::new().sign(&test_keypair_2());

        for token in [wrong_audience.as_str(), unknown_key.as_str(), "garbage"] {
            let response = test_app()
                .oneshot(request("POST", Some(&format!("Bearer {token}"))))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = body_json(response).await;
            assert_eq!(body["error"], "invalid_token");
            assert_eq!(body["error_description"], "Token validation failed");
        }
    }

    #[tokio::test]
    async fn test_options_bypasses_auth() {
        let response = test_app().oneshot(request("OPTIONS", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "preflight");
    }

    #[tokio::test]
    async fn test_options_with_bad_token_still_bypasses() {
        let response = test_app()
            .oneshot(request("OPTIONS", Some("Bearer garbage")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
