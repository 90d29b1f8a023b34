//! Tool invocation seam.
//!
//! The gateway does not know what tools exist. A [`ToolInvoker`] publishes
//! its catalog and, for each call, receives the tool name and its JSON
//! arguments and returns JSON; everything behind that contract (request
//! templates, remote API calls) is the invoker's concern.
//!
//! # Components
//!
//! - `upstream` - forwards calls to a remote HTTP service
//! - `mock` - scripted invoker for tests

pub mod upstream;

pub use upstream::UpstreamInvoker;

use crate::auth::claims::Claims;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Per-call context handed to the invoker.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Verified claims of the caller, `None` when authentication is disabled.
    pub claims: Option<Claims>,
}

impl ToolContext {
    pub fn new(claims: Option<Claims>) -> Self {
        Self { claims }
    }

    /// Subject of the verified caller, if any.
    pub fn subject(&self) -> Option<&str> {
        self.claims.as_ref().map(|c| c.sub.as_str())
    }
}

/// One entry of a `tools/list` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's arguments.
    #[serde(rename = "inputSchema", default = "open_object_schema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Descriptor accepting any object as arguments.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: open_object_schema(),
        }
    }
}

fn open_object_schema() -> Value {
    json!({ "type": "object" })
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("No upstream service configured")]
    NotConfigured,

    /// Remote service failed. The detail is logged, not returned to callers.
    #[error("Upstream request failed: {0}")]
    Upstream(String),
}

impl ToolError {
    /// Message safe to return to a caller.
    pub fn client_message(&self) -> String {
        match self {
            ToolError::UnknownTool(_) | ToolError::NotConfigured => self.to_string(),
            ToolError::Upstream(_) => "Upstream request failed".to_string(),
        }
    }
}

/// Lists and executes tools.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Tools the caller may invoke.
    async fn list(&self, ctx: &ToolContext) -> Result<Vec<ToolDescriptor>, ToolError>;

    async fn invoke(&self, ctx: &ToolContext, name: &str, params: Value)
        -> Result<Value, ToolError>;
}

/// Invoker used when no upstream is configured. It lists no tools and every
/// call fails with `ToolError::NotConfigured`.
pub struct UnconfiguredInvoker;

#[async_trait]
impl ToolInvoker for UnconfiguredInvoker {
    async fn list(&self, _ctx: &ToolContext) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(Vec::new())
    }

    async fn invoke(
        &self,
        _ctx: &ToolContext,
        name: &str,
        _params: Value,
    ) -> Result<Value, ToolError> {
        tracing::warn!(target: "gw.tools", tool = %name, "Tool call with no upstream configured");
        Err(ToolError::NotConfigured)
    }
}

/// Mock tool invoker for testing.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// One recorded call.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub name: String,
        pub params: Value,
        pub subject: Option<String>,
    }

    /// Mock tool invoker.
    ///
    /// Echoes its input by default and records every call.
    pub struct MockToolInvoker {
        /// Fixed response, or `None` to echo the call back.
        response: Option<Value>,
        /// Whether to return errors.
        return_error: bool,
        /// Catalog returned by `list`.
        tools: Vec<ToolDescriptor>,
        /// Calls received, oldest first.
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockToolInvoker {
        /// Create a mock that echoes `{tool, arguments, subject}`.
        pub fn echoing() -> Self {
            Self {
                response: None,
                return_error: false,
                tools: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock that always returns `response`.
        pub fn with_response(response: Value) -> Self {
            Self {
                response: Some(response),
                return_error: false,
                tools: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock that returns upstream errors.
        pub fn failing() -> Self {
            Self {
                response: None,
                return_error: true,
                tools: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Publish `tools` from `list`.
        pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
            self.tools = tools;
            self
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.calls().len()
        }

        /// Get a copy of the calls made.
        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ToolInvoker for MockToolInvoker {
        async fn list(&self, _ctx: &ToolContext) -> Result<Vec<ToolDescriptor>, ToolError> {
            if self.return_error {
                return Err(ToolError::Upstream("mock upstream error".to_string()));
            }
            Ok(self.tools.clone())
        }

        async fn invoke(
            &self,
            ctx: &ToolContext,
            name: &str,
            params: Value,
        ) -> Result<Value, ToolError> {
            let subject = ctx.subject().map(ToString::to_string);

            if let Ok(mut calls) = self.calls.lock() {
                calls.push(RecordedCall {
                    name: name.to_string(),
                    params: params.clone(),
                    subject: subject.clone(),
                });
            }

            if self.return_error {
                return Err(ToolError::Upstream("mock upstream error".to_string()));
            }

            Ok(self.response.clone().unwrap_or_else(|| {
                json!({
                    "tool": name,
                    "arguments": params,
                    "subject": subject,
                })
            }))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::mock::MockToolInvoker;
    use super::*;

    fn claims(sub: &str) -> Claims {
        serde_json::from_value(json!({
            "sub": sub,
            "aud": "svc",
            "iss": "https://idp.test/",
            "exp": 1_900_000_000,
        }))
        .unwrap()
    }

    #[test]
    fn test_context_subject() {
        assert_eq!(ToolContext::default().subject(), None);
        assert_eq!(
            ToolContext::new(Some(claims("auth0|u1"))).subject(),
            Some("auth0|u1")
        );
    }

    #[test]
    fn test_upstream_detail_not_in_client_message() {
        let err = ToolError::Upstream("connect to 10.0.0.7:443 refused".to_string());
        assert_eq!(err.client_message(), "Upstream request failed");

        let err = ToolError::UnknownTool("get_plans".to_string());
        assert_eq!(err.client_message(), "Unknown tool: get_plans");
    }

    #[tokio::test]
    async fn test_unconfigured_invoker_fails() {
        let result = UnconfiguredInvoker
            .invoke(&ToolContext::default(), "get_plans", json!({}))
            .await;

        assert!(matches!(result, Err(ToolError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_unconfigured_invoker_lists_nothing() {
        let tools = UnconfiguredInvoker
            .list(&ToolContext::default())
            .await
            .unwrap();

        assert!(tools.is_empty());
    }

    #[test]
    fn test_descriptor_wire_shape() {
        let descriptor = ToolDescriptor::new("get_songs", "All songs in the library");

        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "name": "get_songs",
                "description": "All songs in the library",
                "inputSchema": {"type": "object"},
            })
        );

        // Upstream catalogs may omit the description and schema
        let parsed: ToolDescriptor = serde_json::from_value(json!({"name": "get_plans"})).unwrap();
        assert_eq!(parsed.description, None);
        assert_eq!(parsed.input_schema, json!({"type": "object"}));
    }

    #[tokio::test]
    async fn test_mock_lists_configured_tools() {
        let mock = MockToolInvoker::echoing()
            .with_tools(vec![ToolDescriptor::new("get_plans", "Plans for a service type")]);

        let tools = mock.list(&ToolContext::default()).await.unwrap();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_plans");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_echoes_and_records() {
        let mock = MockToolInvoker::echoing();
        let ctx = ToolContext::new(Some(claims("auth0|u1")));

        let result = mock
            .invoke(&ctx, "get_plans", json!({"limit": 5}))
            .await
            .unwrap();

        assert_eq!(result["tool"], "get_plans");
        assert_eq!(result["arguments"]["limit"], 5);
        assert_eq!(result["subject"], "auth0|u1");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls()[0].subject.as_deref(), Some("auth0|u1"));
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let mock = MockToolInvoker::failing();
        let result = mock
            .invoke(&ToolContext::default(), "x", json!(null))
            .await;

        assert!(matches!(result, Err(ToolError::Upstream(_))));
        assert_eq!(mock.call_count(), 1);
    }
}
