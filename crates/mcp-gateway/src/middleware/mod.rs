//! Middleware for the gateway.
//!
//! # Components
//!
//! - `auth` - bearer token enforcement for protected routes
//! - `http_metrics` - HTTP request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState, ClaimsExt};
pub use http_metrics::http_metrics_middleware;
