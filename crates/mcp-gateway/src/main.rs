//! MCP Gateway
//!
//! Entry point for the authenticated tool-calling gateway.

use mcp_gateway::config::Config;
use mcp_gateway::observability::metrics::init_metrics_recorder;
use mcp_gateway::routes::{self, AppState};
use mcp_gateway::tools::{ToolInvoker, UnconfiguredInvoker, UpstreamInvoker};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcp_gateway=debug,gw=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MCP Gateway");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        auth_configured = config.auth_settings().is_some(),
        upstream_configured = config.upstream.is_some(),
        "Configuration loaded successfully"
    );

    // Metrics recorder must be installed before anything records
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let tool_invoker: Arc<dyn ToolInvoker> = match &config.upstream {
        Some(upstream) => {
            info!(base_url = %upstream.base_url, "Forwarding tool calls to upstream");
            Arc::new(UpstreamInvoker::new(upstream)?)
        }
        None => {
            warn!("UPSTREAM_BASE_URL not set - tool calls will fail");
            Arc::new(UnconfiguredInvoker)
        }
    };

    let bind_address = config.bind_address.clone();
    let drain_period = config.drain_period;

    let state = Arc::new(AppState {
        config,
        tool_invoker,
    });

    // Build application routes
    let app = routes::build_routes(state, metrics_handle);

    // Parse bind address
    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("MCP Gateway listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_period))
    .await?;

    info!("MCP Gateway shutdown complete");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM, after `drain_period` has elapsed.
async fn shutdown_signal(drain_period: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal_name = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    info!(signal = signal_name, "Shutdown signal received");

    if !drain_period.is_zero() {
        warn!(
            drain_seconds = drain_period.as_secs(),
            "Draining in-flight requests before shutdown"
        );
        tokio::time::sleep(drain_period).await;
    }
}
