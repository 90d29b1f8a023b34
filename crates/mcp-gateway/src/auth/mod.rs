//! Authentication for the gateway.
//!
//! # Components
//!
//! - `claims` - verified token payload
//! - `jwks` - identity-provider key set cache
//! - `jwt` - bearer token verification

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::{Audience, Claims};
pub use jwks::{HttpKeySource, JwksCache, JwksError, KeySource, SigningKey};
pub use jwt::{AuthOutcome, JwtValidator, TokenError};
