//! Assembly of the aggregated health report for both the fast and full paths

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::aggregator::{race_deadline, ProbeAggregator};
use super::collaborators::{DatabaseHandle, GatewayClient, MessageHub, MetricsSource};
use super::format::format_uptime;
use super::metrics::{MetricsSnapshot, SystemMetricsCollector};
use super::persisted::{PersistedStateCollector, PersistedStateHealth};
use super::probe::{Probe, ProbeResult};
use super::probes::{BackendProbe, DatabaseProbe, GatewayCheck, GatewayProbe, MessageHubProbe};
use super::reducer::{reduce, ResourceThresholds};
use super::status::HealthStatus;
use crate::config::{AppInfo, GatewayConfig, HealthConfig};

pub const UPTIME_UNAVAILABLE: &str = "Unavailable";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub status: HealthStatus,
    pub services: BTreeMap<String, ProbeResult>,
    pub system_metrics: MetricsSnapshot,
    pub database_health: PersistedStateHealth,
    pub uptime: String,
    pub version: String,
    pub environment: String,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Response body for both health endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub health: HealthReport,
    pub response_time_ms: u64,
}

impl From<HealthReport> for HealthResponse {
    fn from(health: HealthReport) -> Self {
        let response_time_ms = u64::try_from(health.elapsed.as_millis()).unwrap_or(u64::MAX);
        Self {
            success: true,
            health,
            response_time_ms,
        }
    }
}

/// Long-lived collaborator handles, owned elsewhere and only read here.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub database: Option<Arc<dyn DatabaseHandle>>,
    pub hub: Option<Arc<dyn MessageHub>>,
    pub gateway: Option<Arc<dyn GatewayClient>>,
    pub metrics: Option<Arc<dyn MetricsSource>>,
}

enum MetricsOutcome {
    System(MetricsSnapshot),
    Persisted(PersistedStateHealth),
}

const SYSTEM_METRICS_TASK: &str = "system_metrics";
const PERSISTED_STATE_TASK: &str = "database_health";

#[derive(Clone)]
pub struct HealthService {
    full: ProbeAggregator,
    fast: ProbeAggregator,
    system_metrics: Option<SystemMetricsCollector>,
    persisted_state: PersistedStateCollector,
    metrics_source: Option<Arc<dyn MetricsSource>>,
    metrics_budget: Duration,
    thresholds: ResourceThresholds,
    info: AppInfo,
}

impl HealthService {
    pub fn new(
        collaborators: Collaborators,
        health: &HealthConfig,
        gateway: &GatewayConfig,
        info: AppInfo,
    ) -> Self {
        let started_at = Instant::now();

        let shared: Vec<Arc<dyn Probe>> = vec![
            Arc::new(BackendProbe::new(
                collaborators.metrics.clone(),
                info.version.clone(),
                started_at,
            )),
            Arc::new(DatabaseProbe::new(collaborators.database.clone())),
            Arc::new(MessageHubProbe::new(collaborators.hub.clone())),
        ];
        let gateway_probe = |check| -> Arc<dyn Probe> {
            Arc::new(GatewayProbe::new(
                collaborators.gateway.clone(),
                check,
                gateway.endpoint(),
                gateway.command_timeout(),
            ))
        };

        let mut full_probes = shared.clone();
        full_probes.push(gateway_probe(GatewayCheck::CoreStatus));
        let mut fast_probes = shared;
        fast_probes.push(gateway_probe(GatewayCheck::Liveness));

        let system_metrics = collaborators.metrics.clone().map(|source| {
            SystemMetricsCollector::new(source, collaborators.hub.clone(), health.cpu_sample_window())
        });

        Self {
            full: ProbeAggregator::new(full_probes, health.probe_budget()),
            fast: ProbeAggregator::new(fast_probes, health.probe_budget()),
            system_metrics,
            persisted_state: PersistedStateCollector::new(
                collaborators.database,
                health.tracked_entities.clone(),
            ),
            metrics_source: collaborators.metrics,
            metrics_budget: health.metrics_budget(),
            thresholds: ResourceThresholds::from(health),
            info,
        }
    }

    /// Parallel probes and metrics, each phase bounded by its own budget.
    pub async fn full_report(&self) -> HealthReport {
        let start = Instant::now();
        let timestamp = Utc::now();

        let services = self.full.run_parallel().await;
        let (system_metrics, database_health) = self.collect_metrics_within(self.metrics_budget).await;

        self.assemble(start, timestamp, services, system_metrics, database_health)
    }

    /// Sequential probes and a single unbounded metrics pass.
    pub async fn fast_report(&self) -> HealthReport {
        let start = Instant::now();
        let timestamp = Utc::now();

        let services = self.fast.run_sequential().await;
        let system_metrics = match &self.system_metrics {
            Some(collector) => collector.collect().await,
            None => MetricsSnapshot::default(),
        };
        let database_health = self.persisted_state.collect().await;

        self.assemble(start, timestamp, services, system_metrics, database_health)
    }

    async fn collect_metrics_within(&self, budget: Duration) -> (MetricsSnapshot, PersistedStateHealth) {
        let mut tasks: Vec<(String, BoxFuture<'static, MetricsOutcome>)> = Vec::with_capacity(2);

        if let Some(collector) = self.system_metrics.clone() {
            tasks.push((
                SYSTEM_METRICS_TASK.to_string(),
                async move { MetricsOutcome::System(collector.collect().await) }.boxed(),
            ));
        }
        let persisted = self.persisted_state.clone();
        tasks.push((
            PERSISTED_STATE_TASK.to_string(),
            async move { MetricsOutcome::Persisted(persisted.collect().await) }.boxed(),
        ));

        let collected = race_deadline(tasks, budget).await;
        if !collected.pending.is_empty() {
            warn!("Metrics collection exceeded {:?}; missing: {}", budget, collected.pending.join(", "));
        }

        let mut system_metrics = MetricsSnapshot::default();
        let mut database_health = PersistedStateHealth::default();
        for outcome in collected.completed.into_values() {
            match outcome {
                MetricsOutcome::System(snapshot) => system_metrics = snapshot,
                MetricsOutcome::Persisted(state) => database_health = state,
            }
        }

        (system_metrics, database_health)
    }

    fn assemble(
        &self,
        start: Instant,
        timestamp: DateTime<Utc>,
        services: BTreeMap<String, ProbeResult>,
        system_metrics: MetricsSnapshot,
        database_health: PersistedStateHealth,
    ) -> HealthReport {
        let status = reduce(&services, &system_metrics, &self.thresholds);
        if self.thresholds.exceeded_by(&system_metrics) {
            warn!(
                cpu = system_metrics.cpu.usage_percent,
                memory = system_metrics.memory.usage_percent,
                disk = system_metrics.disk.usage_percent,
                "Resource usage above critical threshold"
            );
        }

        let report = HealthReport {
            timestamp,
            status,
            services,
            system_metrics,
            database_health,
            uptime: self.uptime(),
            version: self.info.version.clone(),
            environment: self.info.environment.clone(),
            elapsed: start.elapsed(),
        };

        info!("Health check completed - Overall status: {} in {:?}", report.status, report.elapsed);
        report
    }

    fn uptime(&self) -> String {
        let Some(source) = &self.metrics_source else {
            return UPTIME_UNAVAILABLE.to_string();
        };

        match source.host_uptime() {
            Ok(uptime) => format_uptime(uptime),
            Err(e) => {
                debug!("Host uptime unavailable: {}", e);
                UPTIME_UNAVAILABLE.to_string()
            }
        }
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.full.probe_names()
    }

    pub fn probe_budget(&self) -> Duration {
        self.full.budget()
    }
}
