//! Concrete probes, one per collaborator

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::collaborators::{DatabaseHandle, GatewayClient, MessageHub, MetricsSource};
use super::probe::{Probe, ProbeResult};
use super::status::HealthStatus;
use crate::error::GatewayError;

pub const BACKEND: &str = "backend";
pub const DATABASE: &str = "database";
pub const MESSAGE_HUB: &str = "message_hub";
pub const TELEPHONY_GATEWAY: &str = "telephony_gateway";

/// Reports on this process itself. Always healthy; details are best effort.
pub struct BackendProbe {
    metrics: Option<Arc<dyn MetricsSource>>,
    version: String,
    started_at: Instant,
}

impl BackendProbe {
    pub fn new(metrics: Option<Arc<dyn MetricsSource>>, version: String, started_at: Instant) -> Self {
        Self {
            metrics,
            version,
            started_at,
        }
    }
}

#[async_trait::async_trait]
impl Probe for BackendProbe {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn run(&self) -> ProbeResult {
        let start = Instant::now();
        let mut result = ProbeResult::new(BACKEND, HealthStatus::Healthy, Duration::ZERO)
            .with_detail("pid", std::process::id())
            .with_detail("version", self.version.as_str())
            .with_detail("uptime_seconds", self.started_at.elapsed().as_secs());

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            result = result.with_detail("worker_threads", runtime.metrics().num_workers());
        }

        if let Some(metrics) = &self.metrics {
            match metrics.process_usage() {
                Ok(process) => {
                    result = result
                        .with_detail("memory_usage", process.resident_bytes)
                        .with_detail("cpu_usage", process.cpu_percent);
                }
                Err(e) => debug!("Process usage unavailable: {}", e),
            }
        }

        result.latency = start.elapsed();
        result
    }
}

pub struct DatabaseProbe {
    db: Option<Arc<dyn DatabaseHandle>>,
}

impl DatabaseProbe {
    pub fn new(db: Option<Arc<dyn DatabaseHandle>>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Probe for DatabaseProbe {
    fn name(&self) -> &str {
        DATABASE
    }

    async fn run(&self) -> ProbeResult {
        let start = Instant::now();

        let Some(db) = &self.db else {
            return ProbeResult::new(DATABASE, HealthStatus::Critical, start.elapsed())
                .with_error("Database connection not available");
        };

        let mut result = match db.ping().await {
            Ok(()) => {
                let stats = db.pool_stats();
                ProbeResult::new(DATABASE, HealthStatus::Healthy, Duration::ZERO)
                    .with_detail("connection", "active")
                    .with_detail("open_connections", stats.open_connections)
                    .with_detail("in_use", stats.in_use)
                    .with_detail("idle", stats.idle)
            }
            Err(e) => ProbeResult::new(DATABASE, HealthStatus::Unhealthy, Duration::ZERO)
                .with_error(format!("Database ping failed: {}", e)),
        };

        result.latency = start.elapsed();
        result
    }
}

pub struct MessageHubProbe {
    hub: Option<Arc<dyn MessageHub>>,
}

impl MessageHubProbe {
    pub fn new(hub: Option<Arc<dyn MessageHub>>) -> Self {
        Self { hub }
    }
}

#[async_trait::async_trait]
impl Probe for MessageHubProbe {
    fn name(&self) -> &str {
        MESSAGE_HUB
    }

    async fn run(&self) -> ProbeResult {
        let start = Instant::now();

        let mut result = match &self.hub {
            None => ProbeResult::new(MESSAGE_HUB, HealthStatus::Unhealthy, Duration::ZERO)
                .with_error("Message hub not available"),
            Some(hub) => ProbeResult::new(MESSAGE_HUB, HealthStatus::Healthy, Duration::ZERO)
                .with_detail("active_clients", hub.client_count().await)
                .with_detail("connected_endpoints", hub.connected_endpoint_count().await),
        };

        result.latency = start.elapsed();
        result
    }
}

/// Which gateway command the probe issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCheck {
    /// Lightweight `Ping`, used by the fast path.
    Liveness,
    /// Heavier `CoreStatus`, used by the full path.
    CoreStatus,
}

impl GatewayCheck {
    pub fn action(self) -> &'static str {
        match self {
            GatewayCheck::Liveness => "Ping",
            GatewayCheck::CoreStatus => "CoreStatus",
        }
    }

    fn label(self) -> &'static str {
        match self {
            GatewayCheck::Liveness => "ping",
            GatewayCheck::CoreStatus => "command",
        }
    }
}

pub struct GatewayProbe {
    client: Option<Arc<dyn GatewayClient>>,
    check: GatewayCheck,
    endpoint: String,
    command_timeout: Duration,
}

impl GatewayProbe {
    pub fn new(
        client: Option<Arc<dyn GatewayClient>>,
        check: GatewayCheck,
        endpoint: String,
        command_timeout: Duration,
    ) -> Self {
        Self {
            client,
            check,
            endpoint,
            command_timeout,
        }
    }

    async fn round_trip(&self, client: &dyn GatewayClient) -> ProbeResult {
        let start = Instant::now();
        let label = self.check.label();

        let outcome = tokio::time::timeout(self.command_timeout, client.send_command(self.check.action()))
            .await
            .unwrap_or_else(|_| {
                Err(GatewayError::Timeout(
                    u64::try_from(self.command_timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            });
        let round_trip_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Err(e) => ProbeResult::new(TELEPHONY_GATEWAY, HealthStatus::Unhealthy, Duration::ZERO)
                .with_error(format!("Gateway {} failed: {}", label, e))
                .with_detail("gateway_connected", false),
            Ok(response) if !response.success => {
                ProbeResult::new(TELEPHONY_GATEWAY, HealthStatus::Warning, Duration::ZERO)
                    .with_error(format!("Gateway {} returned error", label))
                    .with_detail("gateway_connected", true)
                    .with_detail("command_error", response.error.unwrap_or_default())
            }
            Ok(_) => {
                let result = ProbeResult::new(TELEPHONY_GATEWAY, HealthStatus::Healthy, Duration::ZERO)
                    .with_detail("gateway_connected", true)
                    .with_detail("round_trip_ms", round_trip_ms);
                match self.check {
                    GatewayCheck::Liveness => result
                        .with_detail("ping_success", true)
                        .with_detail("last_ping", Utc::now().to_rfc3339()),
                    GatewayCheck::CoreStatus => result.with_detail("core_status", "running"),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Probe for GatewayProbe {
    fn name(&self) -> &str {
        TELEPHONY_GATEWAY
    }

    async fn run(&self) -> ProbeResult {
        let start = Instant::now();

        let mut result = match &self.client {
            None => ProbeResult::new(TELEPHONY_GATEWAY, HealthStatus::Unhealthy, Duration::ZERO)
                .with_error("Gateway client not initialized - connection to gateway failed")
                .with_detail("gateway_host", self.endpoint.as_str())
                .with_detail("connection_status", "failed"),
            Some(client) if !client.is_connected() => {
                match tokio::time::timeout(self.command_timeout, client.reconnect()).await {
                    Ok(Ok(())) => {
                        debug!("Gateway session re-established at {}", self.endpoint);
                        self.round_trip(client.as_ref()).await
                    }
                    _ => {
                        let mut result =
                            ProbeResult::new(TELEPHONY_GATEWAY, HealthStatus::Unhealthy, Duration::ZERO)
                                .with_error("Gateway client not connected")
                                .with_detail("gateway_connected", false);
                        if let Some(last_contact) = client.last_contact() {
                            result = result.with_detail("last_contact", last_contact.to_rfc3339());
                        }
                        result
                    }
                }
            }
            Some(client) => self.round_trip(client.as_ref()).await,
        };

        result.latency = start.elapsed();
        result
    }
}
