//! MCP Gateway Library
//!
//! An authentication gateway in front of a tool-calling (MCP) endpoint:
//!
//! - Verifies RS256 bearer tokens against an identity provider's JWKS
//! - Serves OAuth protected-resource metadata so clients can find the
//!   provider
//! - Forwards authenticated JSON-RPC tool calls to a tool invoker
//!
//! When no identity provider is configured the gateway serves tool calls
//! without authentication and says so loudly at startup.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/jwt.rs -> auth/jwks.rs
//!               -> handlers/*.rs -> tools/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token verification and key set cache
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Auth enforcement and HTTP metrics
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `tools` - Tool invocation seam and upstream passthrough

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod tools;
