//! Protected Resource Metadata (RFC 9728 Section 3).
//!
//! Tells clients which identity provider issues tokens for this gateway and
//! which scopes to request. Served without authentication at the root and at
//! `/.well-known/oauth-protected-resource`.

use crate::config::{AuthSettings, Config};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Well-known path for the metadata document.
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-protected-resource";

/// Metadata document. Built once at startup and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Resource identifier; the audience tokens must carry.
    pub resource: String,

    /// Issuer URLs of the identity providers that can mint tokens.
    pub authorization_servers: Vec<String>,

    /// Scopes clients may request.
    pub scopes_supported: Vec<String>,

    /// Methods supported for sending bearer tokens.
    pub bearer_methods_supported: Vec<String>,

    /// Human-readable name.
    pub resource_name: String,
}

impl ProtectedResourceMetadata {
    /// Build the document for a configured identity provider.
    pub fn from_settings(settings: &AuthSettings, config: &Config) -> Self {
        Self {
            resource: settings.audience.clone(),
            authorization_servers: vec![format!("https://{}", settings.domain)],
            scopes_supported: config.scopes_supported.clone(),
            bearer_methods_supported: vec!["header".to_string()],
            resource_name: config.resource_name.clone(),
        }
    }
}

/// Handler for the metadata document.
pub async fn discovery_handler(
    State(metadata): State<Arc<ProtectedResourceMetadata>>,
) -> Json<ProtectedResourceMetadata> {
    Json((*metadata).clone())
}
