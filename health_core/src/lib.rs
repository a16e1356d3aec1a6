//! Bounded-time health aggregation engine and the HTTP surface that exposes it.

pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod monitoring;
pub mod websocket;

pub use crate::config::AppConfig;
pub use database::{get_database_pool, SqliteDatabase};
pub use error::{AppError, GatewayError, MetricsError, Result};
pub use gateway::AmiGatewayClient;
pub use handlers::create_routes;
pub use health::{
    Collaborators, HealthReport, HealthResponse, HealthService, HealthStatus, ProbeResult,
};
pub use monitoring::SysinfoMetricsSource;
pub use websocket::{websocket_handler, RealtimeHub};

use axum::Router;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<HealthService>,
    pub hub: Option<RealtimeHub>,
}

impl AppState {
    pub fn new(health: HealthService) -> Self {
        Self {
            health: Arc::new(health),
            hub: None,
        }
    }

    pub fn with_hub(mut self, hub: RealtimeHub) -> Self {
        self.hub = Some(hub);
        self
    }
}

pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .merge(create_routes())
        .layer(middleware::cors::cors_layer_from_config(&config.cors))
        .layer(middleware::logging::logging_layer())
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
