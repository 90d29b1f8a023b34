//! JWT validation for the gateway.
//!
//! Validates incoming bearer tokens using public keys from the identity
//! provider's JWKS endpoint.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted; any other header `alg` is rejected before a key
//!   is looked up, so `none` and HMAC tokens never reach the key set
//! - The signature is verified before any claim is trusted
//! - `exp`, `aud`, `iss` and `sub` are required

use crate::auth::claims::Claims;
use crate::auth::jwks::{JwksCache, JwksError, SigningKey};
use crate::observability::metrics::record_token_validation;
use chrono::Utc;
use common::jwt::parse_header;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Why a token was rejected.
///
/// The `InvalidToken` reason is for server logs only and never reaches a
/// client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not a structurally valid JWT (or too large to be one).
    #[error("malformed token")]
    Malformed,

    /// Structurally valid but not acceptable.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Signature valid but `exp` has passed.
    #[error("token expired")]
    Expired,
}

impl TokenError {
    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::InvalidToken(_) => "invalid",
            TokenError::Expired => "expired",
        }
    }
}

/// Result of verifying one bearer token.
pub type AuthOutcome = Result<Claims, TokenError>;

/// JWT validator bound to one audience and issuer.
pub struct JwtValidator {
    /// Key cache for the identity provider.
    jwks: Arc<JwksCache>,

    /// Expected `aud` value.
    audience: String,

    /// Expected `iss` value, compared exactly.
    issuer: String,

    /// Leeway in seconds applied to `exp`.
    leeway_seconds: u64,
}

impl JwtValidator {
    /// Create a new JWT validator.
    pub fn new(
        jwks: Arc<JwksCache>,
        audience: impl Into<String>,
        issuer: impl Into<String>,
        leeway_seconds: u64,
    ) -> Self {
        Self {
            jwks,
            audience: audience.into(),
            issuer: issuer.into(),
            leeway_seconds,
        }
    }

    /// The audience tokens must carry.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Validate a JWT and return the claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Parse header for `kid` and `alg`; `alg` must be RS256
    /// 3. Resolve the signing key from the JWKS cache
    /// 4. Verify the RS256 signature
    /// 5. Validate `exp`, then `aud` and `iss`
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> AuthOutcome {
        let outcome = self.verify_inner(token).await;

        match &outcome {
            Ok(_) => {
                tracing::debug!(target: "gw.auth.jwt", "Token validated successfully");
                record_token_validation("success", "none");
            }
            Err(e) => record_token_validation("error", e.error_type()),
        }

        outcome
    }

    async fn verify_inner(&self, token: &str) -> AuthOutcome {
        // 1-2. Size check and header parse (common::jwt)
        let header = parse_header(token).map_err(|e| {
            tracing::debug!(target: "gw.auth.jwt", error = ?e, "Token header parse failed");
            TokenError::Malformed
        })?;

        if header.alg != "RS256" {
            return Err(TokenError::InvalidToken(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }

        // 3. Resolve the signing key
        let key = self.jwks.resolve(&header.kid).await.map_err(|e| match e {
            JwksError::KeyNotFound => {
                TokenError::InvalidToken(format!("unknown signing key {}", header.kid))
            }
            JwksError::FetchFailed(reason) => {
                TokenError::InvalidToken(format!("signing keys unavailable: {reason}"))
            }
        })?;

        // 4-5. Signature and claims
        let claims = verify_token(token, &key, &self.validation())?;

        // jsonwebtoken still accepts `exp == now - leeway`; a token is
        // expired from its `exp` second onward
        let leeway = i64::try_from(self.leeway_seconds).unwrap_or(i64::MAX);
        if claims.exp <= Utc::now().timestamp().saturating_sub(leeway) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.leeway = self.leeway_seconds;
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation
    }
}

/// Verify JWT signature and claims against one RSA key.
fn verify_token(token: &str, key: &SigningKey, validation: &Validation) -> AuthOutcome {
    let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e).map_err(|e| {
        tracing::error!(target: "gw.auth.jwt", kid = %key.kid, error = %e, "Invalid RSA key components");
        TokenError::InvalidToken("signing key is unusable".to_string())
    })?;

    let token_data = decode::<Claims>(token, &decoding_key, validation).map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => {
                TokenError::InvalidToken("signature verification failed".to_string())
            }
            ErrorKind::InvalidAudience => TokenError::InvalidToken("audience mismatch".to_string()),
            ErrorKind::InvalidIssuer => TokenError::InvalidToken("issuer mismatch".to_string()),
            ErrorKind::MissingRequiredClaim(claim) => {
                TokenError::InvalidToken(format!("missing required claim {claim}"))
            }
            _ => TokenError::InvalidToken(format!("verification failed: {e}")),
        }
    })?;

    Ok(token_data.claims)
}
