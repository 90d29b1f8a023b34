//! JWT utilities shared across gateway crates.
//!
//! This module provides the pre-verification half of JWT handling:
//! - Size limits for DoS prevention
//! - Leeway bounds for `exp` validation
//! - Header parsing (key ID and algorithm) for JWKS key selection
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header is only used to pick a key. Nothing in it is trusted for
//!   authorization decisions, and the signature MUST still be verified.
//! - Error messages are intentionally generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_header, MAX_JWT_SIZE_BYTES};
//!
//! let header = parse_header(token)?;
//! let key = jwks_cache.resolve(&header.kid).await?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations. Typical identity-provider access tokens are 700-1500 bytes
/// (RS256 signature plus a handful of claims), so 8KB leaves room for large
/// custom-claim sets while bounding base64 decode work per request.
///
/// Per OWASP API Security Top 10 - API4:2023 (Unrestricted Resource Consumption)
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default leeway applied to `exp` validation.
///
/// Zero: a token is expired the second its `exp` passes.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(0);

/// Maximum allowed leeway (10 minutes).
///
/// Prevents misconfiguration that would keep expired tokens usable for
/// a long time.
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while parsing a JWT header.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is malformed")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is malformed")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is malformed")]
    MissingKid,
}

// =============================================================================
// Header Types
// =============================================================================

/// The untrusted JWT header fields needed to select a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtHeader {
    /// Key ID, used to look up the signing key in the JWKS.
    pub kid: String,

    /// Declared signing algorithm (e.g. `RS256`).
    pub alg: String,
}

// =============================================================================
// Functions
// =============================================================================

/// Parse the JWT header without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The `kid` value should only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three dot-separated segments, bad base64url, header
///   not a JSON object, or missing `alg`
/// - `MissingKid` - Header `kid` missing, empty, or not a string
pub fn parse_header(token: &str) -> Result<JwtHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(_payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    // Arrays and scalars are valid JSON but not a header
    let serde_json::Value::Object(fields) = header else {
        tracing::debug!(target: "common.jwt", "Token rejected: header is not a JSON object");
        return Err(JwtValidationError::MalformedToken);
    };

    let alg = fields
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "Token rejected: header missing alg");
            JwtValidationError::MalformedToken
        })?;

    // Reject empty kid values: an empty string can never name a published key
    let kid = fields
        .get("kid")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(JwtHeader { kid, alg })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_leeway_bounds() {
        assert_eq!(DEFAULT_LEEWAY, Duration::ZERO);
        assert_eq!(MAX_LEEWAY, Duration::from_secs(600));
    }

    #[test]
    fn test_parse_header_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"test-key-01"}"#);

        let header = parse_header(&token).unwrap();
        assert_eq!(header.kid, "test-key-01");
        assert_eq!(header.alg, "RS256");
    }

    #[test]
    fn test_parse_header_reports_declared_alg() {
        // parse_header does not police the algorithm; that is the verifier's job
        let token = token_with_header(r#"{"alg":"HS256","kid":"k1"}"#);
        assert_eq!(parse_header(&token).unwrap().alg, "HS256");
    }

    #[test]
    fn test_parse_header_missing_alg() {
        let token = token_with_header(r#"{"typ":"JWT","kid":"k1"}"#);
        assert!(matches!(
            parse_header(&token),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_parse_header_missing_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);
        assert!(matches!(
            parse_header(&token),
            Err(JwtValidationError::MissingKid)
        ));
    }

    #[test]
    fn test_parse_header_wrong_segment_count() {
        assert!(matches!(
            parse_header("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            parse_header("only.two"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            parse_header("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            parse_header(""),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_parse_header_invalid_base64() {
        assert!(matches!(
            parse_header("!!!invalid!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_parse_header_invalid_json() {
        let token = token_with_header("not-json");
        assert!(matches!(
            parse_header(&token),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_parse_header_rejects_non_object_headers() {
        for header in [r#"["alg","RS256"]"#, r#"["k1","RS256"]"#, r#""RS256""#, "42", "null"] {
            let token = token_with_header(header);
            assert!(
                matches!(parse_header(&token), Err(JwtValidationError::MalformedToken)),
                "{header} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_header_non_string_alg() {
        let token = token_with_header(r#"{"alg":256,"kid":"k1"}"#);
        assert!(matches!(
            parse_header(&token),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_parse_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert!(matches!(
            parse_header(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        ));
    }

    #[test]
    fn test_parse_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2; // -2 for two dots
        let payload_len = remaining / 2;
        let sig_len = remaining - payload_len;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(sig_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        assert_eq!(parse_header(&token).unwrap().kid, "key");
    }

    #[test]
    fn test_parse_header_non_string_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":12345}"#);
        assert!(matches!(
            parse_header(&token),
            Err(JwtValidationError::MissingKid)
        ));
    }

    #[test]
    fn test_parse_header_null_and_empty_kid() {
        let null_kid = token_with_header(r#"{"alg":"RS256","kid":null}"#);
        assert!(matches!(
            parse_header(&null_kid),
            Err(JwtValidationError::MissingKid)
        ));

        let empty_kid = token_with_header(r#"{"alg":"RS256","kid":""}"#);
        assert!(matches!(
            parse_header(&empty_kid),
            Err(JwtValidationError::MissingKid)
        ));
    }

    #[test]
    fn test_errors_are_generic() {
        assert_eq!(
            JwtValidationError::TokenTooLarge.to_string(),
            JwtValidationError::MissingKid.to_string()
        );
    }
}
