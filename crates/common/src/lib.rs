//! Common utilities shared across MCP Gateway crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT header parsing and size/leeway limits
pub mod jwt;
