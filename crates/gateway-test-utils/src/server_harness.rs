//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests,
//! with a wiremock server standing in for the identity provider's JWKS
//! endpoint and a `MockToolInvoker` behind `/mcp`.

use crate::crypto_fixtures::{jwks_json, test_keypair};
use crate::token_builders::{TEST_AUDIENCE, TEST_DOMAIN};
use mcp_gateway::config::Config;
use mcp_gateway::observability::metrics::init_metrics_recorder;
use mcp_gateway::routes::{self, AppState};
use mcp_gateway::tools::mock::MockToolInvoker;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mocked identity provider serves its key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Global metrics handle for test servers.
///
/// The Prometheus recorder can only be installed once per process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Mount a JWKS document on `server`.
pub async fn mount_jwks(server: &MockServer, jwks: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
        .mount(server)
        .await;
}

/// Test harness for spawning the gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> anyhow::Result<()> {
///     let server = TestGatewayServer::spawn_open().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    jwks_server: Option<MockServer>,
    tool_invoker: Arc<MockToolInvoker>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a protected gateway whose JWKS holds the primary test key.
    pub async fn spawn_protected() -> Result<Self, anyhow::Error> {
        let jwks_server = MockServer::start().await;
        mount_jwks(&jwks_server, jwks_json(&[&test_keypair()])).await;
        Self::spawn_with_jwks_server(jwks_server, HashMap::new()).await
    }

    /// Spawn a protected gateway against a caller-prepared JWKS server.
    ///
    /// Identity-provider settings point at `jwks_server`; `extra_vars`
    /// override or extend them.
    pub async fn spawn_with_jwks_server(
        jwks_server: MockServer,
        extra_vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("AUTH_DOMAIN".to_string(), TEST_DOMAIN.to_string()),
            ("AUTH_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            (
                "AUTH_JWKS_URL".to_string(),
                format!("{}{}", jwks_server.uri(), JWKS_PATH),
            ),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        vars.extend(extra_vars);

        Self::spawn_with_vars(vars, Some(jwks_server), true).await
    }

    /// Spawn a gateway with no identity provider configured.
    pub async fn spawn_open() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(HashMap::new(), None, false).await
    }

    /// Spawn with explicit configuration variables.
    ///
    /// When `set_base_url` is true, `BASE_URL` is set to the server's own
    /// address after binding.
    pub async fn spawn_with_vars(
        mut vars: HashMap<String, String>,
        jwks_server: Option<MockServer>,
        set_base_url: bool,
    ) -> Result<Self, anyhow::Error> {
        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        if set_base_url {
            vars.entry("BASE_URL".to_string())
                .or_insert_with(|| format!("http://{addr}"));
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let tool_invoker = Arc::new(MockToolInvoker::echoing());
        let state = Arc::new(AppState {
            config: config.clone(),
            tool_invoker: tool_invoker.clone(),
        });

        // Build routes using the gateway's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            jwks_server,
            tool_invoker,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mocked JWKS server, if the gateway is protected.
    pub fn jwks_server(&self) -> Option<&MockServer> {
        self.jwks_server.as_ref()
    }

    /// Number of requests the JWKS endpoint has received.
    pub async fn jwks_fetch_count(&self) -> usize {
        match &self.jwks_server {
            Some(server) => server
                .received_requests()
                .await
                .map(|requests| {
                    requests
                        .iter()
                        .filter(|r| r.url.path() == JWKS_PATH)
                        .count()
                })
                .unwrap_or(0),
            None => 0,
        }
    }

    /// The tool invoker behind `/mcp`.
    pub fn tool_invoker(&self) -> &MockToolInvoker {
        &self.tool_invoker
    }

    /// POST a `tools/call` request to `/mcp`, optionally with a bearer token.
    pub async fn call_tool(
        &self,
        token: Option<&str>,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments },
        });
        self.post_mcp(token.map(|t| format!("Bearer {t}")).as_deref(), &body)
            .await
    }

    /// POST a JSON body to `/mcp` with a raw `Authorization` header value.
    pub async fn post_mcp(
        &self,
        authorization: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let mut request = self.client.post(format!("{}/mcp", self.url())).json(body);
        if let Some(value) = authorization {
            request = request.header("authorization", value);
        }
        Ok(request.send().await?)
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_server_spawns() -> Result<(), anyhow::Error> {
        let server = TestGatewayServer::spawn_open().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.jwks_server().is_none());

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }

    #[tokio::test]
    async fn test_protected_server_points_at_mock_jwks() -> Result<(), anyhow::Error> {
        let server = TestGatewayServer::spawn_protected().await?;

        let settings = server
            .config()
            .auth_settings()
            .expect("protected server must have auth settings");
        assert!(settings.jwks_url.ends_with(JWKS_PATH));
        assert_eq!(settings.base_url, server.url());

        // Lazy: nothing fetched until a token arrives
        assert_eq!(server.jwks_fetch_count().await, 0);

        Ok(())
    }
}
