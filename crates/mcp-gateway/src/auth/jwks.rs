//! JWKS cache for the identity provider's signing keys.
//!
//! Keys are fetched from the provider's `/.well-known/jwks.json` endpoint on
//! first use and memoized by key ID. There is no TTL: a token signed with a
//! key ID that is not cached triggers a refetch of the whole set, which is
//! how rotated-in keys are picked up.
//!
//! # Concurrency
//!
//! Lookups take a read lock on the key map. Fetches are serialized by a
//! separate mutex and the map is re-checked once the mutex is held, so a
//! burst of requests carrying the same new key ID share a single fetch.
//! The map is written in one step after a fetch completes; a request that is
//! cancelled mid-fetch leaves the cache untouched.
//!
//! # Security
//!
//! - Only RSA signature keys usable with RS256 are admitted
//! - The fetch has a bounded timeout
//! - HTTPS is used unless the JWKS URL is explicitly overridden

use crate::observability::metrics::{record_jwks_cache, record_jwks_fetch};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Public verification key for one key ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    /// Key ID the provider publishes this key under.
    pub kid: String,

    /// RSA modulus (base64url).
    pub n: String,

    /// RSA public exponent (base64url).
    pub e: String,
}

/// JSON Web Key as published in the provider's key set.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for the keys this gateway uses).
    pub kty: String,

    /// Key ID. Keys without one cannot be selected and are skipped.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm (should be "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("No key with the requested kid in the key set")]
    KeyNotFound,

    #[error("Key set fetch failed: {0}")]
    FetchFailed(String),
}

/// Where the key set comes from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the full key set.
    async fn fetch(&self) -> Result<Vec<Jwk>, JwksError>;
}

/// Fetches the key set over HTTP.
pub struct HttpKeySource {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,
}

impl HttpKeySource {
    /// Key source for a JWKS URL, as derived by `Config::auth_settings`.
    ///
    /// No network I/O happens here; the first fetch is on first use.
    pub fn new(jwks_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gw.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
        }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Jwk>, JwksError> {
        tracing::debug!(target: "gw.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gw.auth.jwks", error = %e, "Failed to fetch JWKS");
                JwksError::FetchFailed(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gw.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(JwksError::FetchFailed(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gw.auth.jwks", error = %e, "Failed to parse JWKS response");
            JwksError::FetchFailed(format!("unparsable key set: {e}"))
        })?;

        Ok(jwks.keys)
    }
}

/// Convert a published key into a verification key, or `None` if it can't be
/// used for RS256 signature verification.
fn usable_key(jwk: Jwk) -> Option<SigningKey> {
    let Some(kid) = jwk.kid.filter(|k| !k.is_empty()) else {
        tracing::debug!(target: "gw.auth.jwks", "Skipping JWK without kid");
        return None;
    };

    if jwk.kty != "RSA" {
        tracing::debug!(target: "gw.auth.jwks", kid = %kid, kty = %jwk.kty, "Skipping non-RSA JWK");
        return None;
    }
    if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
        tracing::debug!(target: "gw.auth.jwks", kid = %kid, "Skipping JWK not intended for signatures");
        return None;
    }
    if jwk.alg.as_deref().is_some_and(|a| a != "RS256") {
        tracing::debug!(target: "gw.auth.jwks", kid = %kid, "Skipping JWK with non-RS256 alg");
        return None;
    }

    match (jwk.n, jwk.e) {
        (Some(n), Some(e)) if !n.is_empty() && !e.is_empty() => Some(SigningKey { kid, n, e }),
        _ => {
            tracing::debug!(target: "gw.auth.jwks", kid = %kid, "Skipping RSA JWK missing n or e");
            None
        }
    }
}

/// Key-ID-indexed cache over a [`KeySource`].
pub struct JwksCache {
    source: Arc<dyn KeySource>,

    /// Admitted keys by key ID.
    keys: RwLock<HashMap<String, Arc<SigningKey>>>,

    /// Held for the duration of a fetch.
    fetch_gate: Mutex<()>,
}

impl JwksCache {
    /// Create an empty cache. Nothing is fetched until the first `resolve`.
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self {
            source,
            keys: RwLock::new(HashMap::new()),
            fetch_gate: Mutex::new(()),
        }
    }

    /// Get the verification key for `kid`, fetching the key set on a miss.
    ///
    /// # Errors
    ///
    /// Returns `JwksError::FetchFailed` if the key set cannot be fetched.
    /// Returns `JwksError::KeyNotFound` if the fetched set lacks `kid`.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, JwksError> {
        if let Some(key) = self.cached(kid).await {
            tracing::debug!(target: "gw.auth.jwks", "JWKS cache hit");
            record_jwks_cache("hit");
            return Ok(key);
        }
        record_jwks_cache("miss");

        let _gate = self.fetch_gate.lock().await;

        // Another request may have fetched while we waited for the gate
        if let Some(key) = self.cached(kid).await {
            tracing::debug!(target: "gw.auth.jwks", "Key populated by concurrent fetch");
            return Ok(key);
        }

        self.fetch_and_store().await?;

        match self.cached(kid).await {
            Some(key) => Ok(key),
            None => {
                tracing::warn!(target: "gw.auth.jwks", "Key not found in JWKS after refresh");
                Err(JwksError::KeyNotFound)
            }
        }
    }

    /// Number of cached keys.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Whether nothing has been cached yet.
    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }

    async fn cached(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.read().await.get(kid).cloned()
    }

    /// Caller must hold `fetch_gate`.
    async fn fetch_and_store(&self) -> Result<(), JwksError> {
        let start = Instant::now();
        let fetched = self.source.fetch().await;
        let duration = start.elapsed();

        let jwks = match fetched {
            Ok(jwks) => {
                record_jwks_fetch("success", duration);
                jwks
            }
            Err(e) => {
                record_jwks_fetch("error", duration);
                return Err(e);
            }
        };

        let fresh: Vec<SigningKey> = jwks.into_iter().filter_map(usable_key).collect();

        let mut keys = self.keys.write().await;
        for key in fresh {
            keys.insert(key.kid.clone(), Arc::new(key));
        }

        tracing::info!(
            target: "gw.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        Ok(())
    }
}
