//! Main entry point for the health aggregation server

use anyhow::Result;
use health_core::{
    create_app, get_database_pool, run_server, AmiGatewayClient, AppConfig, AppState,
    Collaborators, HealthService, RealtimeHub, SqliteDatabase, SysinfoMetricsSource,
};
use health_core::health::{DatabaseHandle, GatewayClient, MessageHub, MetricsSource};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());
    info!("Environment: {}", config.app.environment);

    let addr: SocketAddr = config.bind_address().parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let database: Option<Arc<dyn DatabaseHandle>> = if config.database.enabled {
        match get_database_pool(&config.database).await {
            Ok(pool) => {
                info!("Database initialized successfully");
                Some(Arc::new(SqliteDatabase::new(pool)))
            }
            Err(e) => {
                warn!("Failed to initialize database, health checks will report it as critical: {}", e);
                None
            }
        }
    } else {
        info!("Database disabled by configuration");
        None
    };

    let gateway: Option<Arc<dyn GatewayClient>> = if config.gateway.enabled {
        match AmiGatewayClient::connect(&config.gateway).await {
            Ok(client) => {
                info!("Telephony gateway connected at {}", client.endpoint());
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("Telephony gateway unavailable at {}: {}", config.gateway.endpoint(), e);
                None
            }
        }
    } else {
        info!("Telephony gateway disabled by configuration");
        None
    };

    let hub = RealtimeHub::new(config.hub.max_connections);
    info!("Realtime hub initialized");

    let metrics: Arc<dyn MetricsSource> = Arc::new(SysinfoMetricsSource::new());
    let hub_handle: Arc<dyn MessageHub> = Arc::new(hub.clone());

    let collaborators = Collaborators {
        database,
        hub: Some(hub_handle),
        gateway,
        metrics: Some(metrics),
    };

    let health = HealthService::new(collaborators, &config.health, &config.gateway, config.app.clone());
    info!("Health probes configured: {}", health.probe_names().join(", "));

    let state = AppState::new(health).with_hub(hub);
    info!("Health aggregator v{} ({})", config.app.version, config.app.environment);

    let app = create_app(state, &config);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "{}={},health_core={},tower_http=debug,axum=debug",
                env!("CARGO_CRATE_NAME").replace('-', "_"),
                default_level,
                default_level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
