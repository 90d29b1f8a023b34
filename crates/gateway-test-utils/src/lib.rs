//! # Gateway Test Utilities
//!
//! Shared test utilities for the MCP gateway.
//!
//! This crate provides:
//! - Deterministic RSA fixtures (fixed keys for reproducible tests)
//! - Test token builder (TestTokenBuilder)
//! - Server test harness (TestGatewayServer with a mocked JWKS endpoint)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestGatewayServer::spawn_protected().await?;
//!
//!     let token = TestTokenBuilder::new()
//!         .for_subject("auth0|alice")
//!         .sign(&test_keypair());
//!
//!     let response = server.call_tool(Some(&token), "get_plans", json!({})).await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
