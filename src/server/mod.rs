//! HTTP server module
//!
//! Serves the Prometheus endpoint. Every scrape runs one sweep over the
//! configured stats servers.

pub mod handlers;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::collector::{CollectConfig, Collector};
use crate::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Stats collector, owns the HTTP connection pool and internal metrics
    pub collector: Arc<Collector>,
}

impl AppState {
    /// Build state, rejecting invalid configuration
    pub fn new(config: Config) -> crate::error::AppResult<Self> {
        config.validate()?;
        let collector = Collector::new(CollectConfig::from(&config))?;
        Ok(Self {
            config: Arc::new(config),
            collector: Arc::new(collector),
        })
    }
}

/// Build the router for the given state
pub fn router(state: AppState) -> Router {
    let metrics_path = state.config.server.path.clone();

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(&metrics_path, get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse a bind address, accepting "localhost" as the IPv4 loopback
pub fn parse_bind_address(bind_address: &str) -> Result<IpAddr> {
    if bind_address == "localhost" {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    bind_address.parse().map_err(|e| {
        anyhow::anyhow!(
            "Invalid bind_address '{}': {}. Use an IP address (e.g., '0.0.0.0', '127.0.0.1') or 'localhost'.",
            bind_address,
            e
        )
    })
}

/// Run the HTTP server
///
/// # Arguments
/// * `config` - Application configuration
/// * `port` - Server port to bind to (overrides config.server.port)
///
/// # Errors
/// Returns an error if the server fails to start
pub async fn run(config: Config, port: u16) -> Result<()> {
    let addr = SocketAddr::from((parse_bind_address(&config.server.bind_address)?, port));
    let metrics_path = config.server.path.clone();
    let servers = config.servers.len();

    let app = router(AppState::new(config)?);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        metrics_path = %metrics_path,
        servers,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
