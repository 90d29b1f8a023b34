//! Passthrough invoker for a remote HTTP service.
//!
//! A call to tool `name` with arguments `args` becomes
//! `POST {base_url}/{name}` with `args` as the JSON body. The JSON response
//! body is returned unchanged. The catalog for `tools/list` is read from
//! `GET {base_url}`, which answers `{"tools": [...]}`; an upstream without a
//! catalog (404 or 405) publishes no tools.
//!
//! # Security
//!
//! - Tool names are restricted to `[A-Za-z0-9_-]` so they cannot alter the
//!   request path
//! - The caller's bearer token is never forwarded; the upstream sees only
//!   the gateway's own basic credentials
//! - Upstream errors are logged server-side; callers get a generic message

use super::{ToolContext, ToolDescriptor, ToolError, ToolInvoker};
use crate::config::{UpstreamConfig, UpstreamCredentials};
use crate::observability::metrics::record_tool_call;
use async_trait::async_trait;
use common::secret::ExposeSecret;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Default timeout for upstream requests in seconds.
const UPSTREAM_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Longest accepted tool name.
const MAX_TOOL_NAME_LEN: usize = 128;

#[derive(Deserialize)]
struct ToolCatalog {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

/// Forwards tool calls to a remote HTTP service.
#[derive(Clone)]
pub struct UpstreamInvoker {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Base URL, without trailing slash.
    base_url: String,

    credentials: Option<UpstreamCredentials>,
}

impl UpstreamInvoker {
    /// Create a new upstream invoker.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::Upstream` if the HTTP client cannot be built.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "gw.tools.upstream", error = %e, "Failed to build HTTP client");
                ToolError::Upstream(format!("client construction failed: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
        })
    }

    fn tool_url(&self, name: &str) -> Result<String, ToolError> {
        let valid = !name.is_empty()
            && name.len() <= MAX_TOOL_NAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ToolError::UnknownTool(name.to_string()));
        }
        Ok(format!("{}/{}", self.base_url, name))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => {
                request.basic_auth(&creds.username, Some(creds.password.expose_secret()))
            }
            None => request,
        }
    }

    async fn catalog(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let response = self
            .authorized(self.client.get(&self.base_url))
            .send()
            .await
            .map_err(|e| {
                warn!(target: "gw.tools.upstream", error = %e, "Upstream catalog request failed");
                ToolError::Upstream(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            debug!(target: "gw.tools.upstream", status = %status, "Upstream publishes no tool catalog");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            warn!(target: "gw.tools.upstream", status = %status, "Upstream catalog returned error status");
            return Err(ToolError::Upstream(format!("upstream returned {status}")));
        }

        let catalog = response.json::<ToolCatalog>().await.map_err(|e| {
            warn!(target: "gw.tools.upstream", error = %e, "Upstream catalog was not a tool list");
            ToolError::Upstream(format!("invalid catalog body: {e}"))
        })?;
        Ok(catalog.tools)
    }

    async fn forward(&self, name: &str, params: Value) -> Result<Value, ToolError> {
        let url = self.tool_url(name)?;

        let request = self.authorized(self.client.post(&url).json(&params));

        let response = request.send().await.map_err(|e| {
            warn!(target: "gw.tools.upstream", tool = %name, error = %e, "Upstream request failed");
            ToolError::Upstream(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ToolError::UnknownTool(name.to_string()));
        }
        if !status.is_success() {
            warn!(target: "gw.tools.upstream", tool = %name, status = %status, "Upstream returned error status");
            return Err(ToolError::Upstream(format!("upstream returned {status}")));
        }

        response.json::<Value>().await.map_err(|e| {
            warn!(target: "gw.tools.upstream", tool = %name, error = %e, "Upstream response was not JSON");
            ToolError::Upstream(format!("invalid response body: {e}"))
        })
    }
}

#[async_trait]
impl ToolInvoker for UpstreamInvoker {
    #[instrument(skip_all)]
    async fn list(&self, _ctx: &ToolContext) -> Result<Vec<ToolDescriptor>, ToolError> {
        self.catalog().await
    }

    #[instrument(skip_all, fields(tool = %name))]
    async fn invoke(
        &self,
        _ctx: &ToolContext,
        name: &str,
        params: Value,
    ) -> Result<Value, ToolError> {
        let start = Instant::now();
        let result = self.forward(name, params).await;
        let status = if result.is_ok() { "success" } else { "error" };
        record_tool_call(status, start.elapsed());
        result
    }
}
