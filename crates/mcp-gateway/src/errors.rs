//! Gateway error types.
//!
//! Every authentication failure maps to a 401 with an RFC 6750 style body
//! and a `WWW-Authenticate` challenge via the `IntoResponse` impl. Messages
//! returned to clients are fixed strings; the actual validation failure is
//! logged server-side by the auth middleware.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// HTTP-facing gateway error.
///
/// Each variant carries the realm (the configured audience) so the challenge
/// header can be built without access to application state.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No `Authorization` header, or not a `Bearer ` credential.
    #[error("Missing or invalid Authorization header")]
    MissingCredentials { realm: String },

    /// Signature verified but `exp` has passed.
    #[error("Token has expired")]
    TokenExpired { realm: String },

    /// Any other verification failure.
    #[error("Token validation failed")]
    InvalidToken { realm: String },
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MissingCredentials { .. }
            | GatewayError::TokenExpired { .. }
            | GatewayError::InvalidToken { .. } => 401,
        }
    }

    /// Machine-readable OAuth error code for the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::MissingCredentials { .. } => "invalid_request",
            GatewayError::TokenExpired { .. } | GatewayError::InvalidToken { .. } => {
                "invalid_token"
            }
        }
    }

    /// Value for the `WWW-Authenticate` response header.
    pub fn challenge(&self) -> String {
        match self {
            GatewayError::MissingCredentials { realm } => format!("Bearer realm=\"{realm}\""),
            GatewayError::TokenExpired { realm } | GatewayError::InvalidToken { realm } => {
                format!("Bearer realm=\"{realm}\", error=\"invalid_token\"")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    error_description: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
        let challenge = self.challenge();

        let body = ErrorResponse {
            error: self.error_code(),
            error_description: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();

        // Realm comes from configuration; a value that is not a valid header
        // is dropped rather than failing the response
        match HeaderValue::from_str(&challenge) {
            Ok(value) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
            Err(e) => {
                tracing::error!(target: "gw.errors", error = %e, "Invalid WWW-Authenticate value");
            }
        }

        response
    }
}
