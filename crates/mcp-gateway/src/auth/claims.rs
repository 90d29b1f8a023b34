//! JWT claims structure.
//!
//! Contains the claims extracted from validated JWTs. The `sub` field is
//! redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// The `aud` claim, which identity providers emit as a string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `audience` is one of the token's audiences.
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// JWT Claims structure for validated tokens.
///
/// Provider-specific claims (`azp`, `permissions`, namespaced custom claims)
/// land in `extra` untouched.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user or client id) - redacted in Debug output.
    pub sub: String,

    /// Audience(s) the token was issued for.
    pub aud: Audience,

    /// Issuer.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Space-separated scopes granted to this token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Every other claim in the payload.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Custom Debug implementation that redacts the `sub` field.
///
/// `extra` is summarized by key only, since custom claims frequently carry
/// email addresses and names.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extra_keys: Vec<&str> = self.extra.keys().map(String::as_str).collect();
        extra_keys.sort_unstable();

        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("aud", &self.aud)
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("scope", &self.scope)
            .field("extra_keys", &extra_keys)
            .finish()
    }
}

impl Claims {
    /// Check if the token has a specific scope.
    ///
    /// Scopes are space-separated in the JWT claims.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(&scope)
    }

    /// Get all scopes as a vector.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Look up a provider-specific claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}
