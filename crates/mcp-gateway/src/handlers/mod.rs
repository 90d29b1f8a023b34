//! HTTP request handlers for the gateway.

pub mod discovery;
pub mod health;
pub mod mcp;
pub mod metrics;

pub use discovery::{discovery_handler, ProtectedResourceMetadata};
pub use health::health_check;
pub use mcp::mcp_handler;
pub use metrics::metrics_handler;
