//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating signed test tokens.

use crate::crypto_fixtures::TestKeypair;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Audience used by the default test token.
pub const TEST_AUDIENCE: &str = "svc";

/// Identity-provider domain used by the default test token.
pub const TEST_DOMAIN: &str = "idp.test";

/// Issuer used by the default test token.
pub const TEST_ISSUER: &str = "https://idp.test/";

/// Builder for creating test JWTs
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_subject("auth0|alice")
///     .with_scope("openid profile")
///     .expires_in(3600)
///     .sign(&test_keypair());
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    ///
    /// Defaults match scenario-style tests: `aud = "svc"`,
    /// `iss = "https://idp.test/"`, expiring in one hour.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));
        Self { claims }
    }

    /// Set the subject
    pub fn for_subject(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set a single audience
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set an audience array
    pub fn with_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    /// Set the issuer
    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set the scope (space-separated)
    pub fn with_scope(self, scope: &str) -> Self {
        self.with_claim("scope", json!(scope))
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign with RS256 using `keypair`, putting its kid in the header.
    pub fn sign(self, keypair: &TestKeypair) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(keypair.kid.clone());

        let key = EncodingKey::from_rsa_pem(keypair.private_pem.as_bytes())
            .expect("test fixture key must parse");

        encode(&header, &self.build(), &key).expect("test token must sign")
    }

    /// Encode with an arbitrary header and signature, without signing.
    ///
    /// For algorithm-confusion tests (`alg: none`, `HS256`).
    pub fn encode_unsigned(self, header: Value, signature: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_b64 = URL_SAFE_NO_PAD.encode(self.build().to_string());
        format!("{header_b64}.{payload_b64}.{signature}")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
