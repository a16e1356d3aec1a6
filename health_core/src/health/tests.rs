#[cfg(test)]
mod tests {
    use crate::config::{AppInfo, GatewayConfig, HealthConfig};
    use crate::error::{AppError, GatewayError, MetricsError, Result};
    use crate::health::probes::{BACKEND, DATABASE, MESSAGE_HUB, TELEPHONY_GATEWAY};
    use crate::health::{
        race_deadline, reduce, reduce_statuses, BackendProbe, Collaborators, DatabaseHandle,
        DatabaseProbe, DetailValue, DiskSample, GatewayCheck, GatewayClient, GatewayProbe,
        GatewayResponse, HealthResponse, HealthService, HealthStatus, MemorySample, MessageHub,
        MessageHubProbe, MetricsSnapshot, MetricsSource, PersistedStateCollector, PoolStats,
        Probe, ProbeAggregator, ProbeResult, ProcessSample, ResourceThresholds,
        SystemMetricsCollector, TIMEOUT_ERROR,
    };
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::{BTreeMap, HashMap};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    struct FakeDatabase {
        reachable: bool,
        counts: HashMap<String, i64>,
        size_bytes: i64,
        count_delay: Duration,
    }

    impl FakeDatabase {
        fn healthy() -> Self {
            Self {
                reachable: true,
                counts: HashMap::from([("users".to_string(), 12), ("call_logs".to_string(), 340)]),
                size_bytes: 1536,
                count_delay: Duration::ZERO,
            }
        }

        fn unreachable() -> Self {
            Self {
                reachable: false,
                counts: HashMap::new(),
                size_bytes: 0,
                count_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait::async_trait]
    impl DatabaseHandle for FakeDatabase {
        async fn ping(&self) -> Result<()> {
            if self.reachable {
                Ok(())
            } else {
                Err(AppError::Database("connection refused".to_string()))
            }
        }

        fn pool_stats(&self) -> PoolStats {
            PoolStats {
                open_connections: 3,
                idle: 2,
                in_use: 1,
            }
        }

        async fn count_rows(&self, entity: &str) -> Result<i64> {
            tokio::time::sleep(self.count_delay).await;
            self.counts
                .get(entity)
                .copied()
                .ok_or_else(|| AppError::Database(format!("no such table: {}", entity)))
        }

        async fn storage_size_bytes(&self) -> Result<i64> {
            Ok(self.size_bytes)
        }
    }

    struct FakeHub {
        clients: usize,
        endpoints: usize,
    }

    #[async_trait::async_trait]
    impl MessageHub for FakeHub {
        async fn client_count(&self) -> usize {
            self.clients
        }

        async fn connected_endpoint_count(&self) -> usize {
            self.endpoints
        }
    }

    struct FakeGateway {
        connected: bool,
        last_contact: Option<DateTime<Utc>>,
        reply: std::result::Result<GatewayResponse, GatewayError>,
        delay: Duration,
        reconnects: bool,
        actions: parking_lot::Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn replying(reply: std::result::Result<GatewayResponse, GatewayError>) -> Self {
            Self {
                connected: true,
                last_contact: None,
                reply,
                delay: Duration::ZERO,
                reconnects: false,
                actions: parking_lot::Mutex::new(Vec::new()),
            }
        }

        fn ok() -> Self {
            Self::replying(Ok(GatewayResponse {
                success: true,
                error: None,
            }))
        }
    }

    #[async_trait::async_trait]
    impl GatewayClient for FakeGateway {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn last_contact(&self) -> Option<DateTime<Utc>> {
            self.last_contact
        }

        async fn send_command(&self, action: &str) -> std::result::Result<GatewayResponse, GatewayError> {
            self.actions.lock().push(action.to_string());
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }

        async fn reconnect(&self) -> std::result::Result<(), GatewayError> {
            if self.reconnects {
                Ok(())
            } else {
                Err(GatewayError::Connect("connection refused".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct FakeMetrics {
        cpu_percent: f64,
        memory: Option<MemorySample>,
        disk: Option<DiskSample>,
        cpu_delay: Duration,
        disk_delay: Duration,
        uptime: Option<Duration>,
    }

    impl FakeMetrics {
        fn nominal() -> Self {
            Self {
                cpu_percent: 12.5,
                memory: Some(MemorySample {
                    total_bytes: 1000,
                    used_bytes: 400,
                    available_bytes: 600,
                }),
                disk: Some(DiskSample {
                    total_bytes: 1000,
                    free_bytes: 750,
                }),
                cpu_delay: Duration::ZERO,
                disk_delay: Duration::ZERO,
                uptime: Some(Duration::from_secs(7300)),
            }
        }
    }

    #[async_trait::async_trait]
    impl MetricsSource for FakeMetrics {
        async fn cpu_usage(&self, _window: Duration) -> std::result::Result<f64, MetricsError> {
            tokio::time::sleep(self.cpu_delay).await;
            Ok(self.cpu_percent)
        }

        fn core_count(&self) -> std::result::Result<usize, MetricsError> {
            Ok(4)
        }

        fn load_average(&self) -> std::result::Result<Vec<f64>, MetricsError> {
            Ok(vec![0.5, 0.4, 0.3])
        }

        fn memory(&self) -> std::result::Result<MemorySample, MetricsError> {
            self.memory
                .ok_or_else(|| MetricsError::Unavailable("memory".to_string()))
        }

        fn disk_usage(&self, path: &Path) -> std::result::Result<DiskSample, MetricsError> {
            std::thread::sleep(self.disk_delay);
            self.disk
                .ok_or_else(|| MetricsError::NoSuchMount(path.display().to_string()))
        }

        fn process_usage(&self) -> std::result::Result<ProcessSample, MetricsError> {
            Ok(ProcessSample {
                resident_bytes: 2048,
                cpu_percent: 1.5,
            })
        }

        fn host_uptime(&self) -> std::result::Result<Duration, MetricsError> {
            self.uptime
                .ok_or_else(|| MetricsError::Unavailable("uptime".to_string()))
        }
    }

    struct ScriptedProbe {
        name: String,
        status: HealthStatus,
        delay: Duration,
    }

    impl ScriptedProbe {
        fn new(name: &str, status: HealthStatus, delay: Duration) -> Arc<dyn Probe> {
            Arc::new(Self {
                name: name.to_string(),
                status,
                delay,
            })
        }
    }

    #[async_trait::async_trait]
    impl Probe for ScriptedProbe {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self) -> ProbeResult {
            tokio::time::sleep(self.delay).await;
            ProbeResult::new(self.name.clone(), self.status, self.delay)
        }
    }

    struct PanickingProbe;

    #[async_trait::async_trait]
    impl Probe for PanickingProbe {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn run(&self) -> ProbeResult {
            panic!("probe crashed");
        }
    }

    fn health_config(probe_budget_ms: u64, metrics_budget_ms: u64) -> HealthConfig {
        HealthConfig {
            probe_budget_ms,
            metrics_budget_ms,
            ..HealthConfig::default()
        }
    }

    fn app_info() -> AppInfo {
        AppInfo {
            environment: "test".to_string(),
            version: "1.0.0".to_string(),
        }
    }

    fn full_collaborators() -> Collaborators {
        Collaborators {
            database: Some(Arc::new(FakeDatabase::healthy())),
            hub: Some(Arc::new(FakeHub { clients: 3, endpoints: 2 })),
            gateway: Some(Arc::new(FakeGateway::ok())),
            metrics: Some(Arc::new(FakeMetrics::nominal())),
        }
    }

    fn gateway_probe(client: Option<Arc<dyn GatewayClient>>, check: GatewayCheck) -> GatewayProbe {
        GatewayProbe::new(client, check, "10.0.0.5:5038".to_string(), Duration::from_millis(200))
    }

    fn results(statuses: &[(&str, HealthStatus)]) -> BTreeMap<String, ProbeResult> {
        statuses
            .iter()
            .map(|(name, status)| (name.to_string(), ProbeResult::new(*name, *status, Duration::ZERO)))
            .collect()
    }

    #[test]
    fn test_health_status_display_and_serialization() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(HealthStatus::Timeout.to_string(), "timeout");
        assert_eq!(serde_json::to_string(&HealthStatus::Critical).unwrap(), "\"critical\"");
        assert_eq!(
            serde_json::from_str::<HealthStatus>("\"warning\"").unwrap(),
            HealthStatus::Warning
        );
    }

    #[test]
    fn test_severity_order() {
        assert!(HealthStatus::Critical.severity() > HealthStatus::Unhealthy.severity());
        assert!(HealthStatus::Unhealthy.severity() > HealthStatus::Warning.severity());
        assert!(HealthStatus::Warning.severity() > HealthStatus::Healthy.severity());
        assert_eq!(HealthStatus::Timeout.severity(), HealthStatus::Healthy.severity());
    }

    #[test]
    fn test_probe_result_serialization_omits_empty_fields() {
        let checked_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let result = ProbeResult::new("database", HealthStatus::Healthy, Duration::from_millis(42))
            .with_checked_at(checked_at);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["response_time_ms"], 42);
        assert_eq!(json["last_check"], "2024-05-01T12:00:00Z");
        assert!(json.get("error").is_none());
        assert!(json.get("details").is_none());
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_probe_result_details_are_typed() {
        let result = ProbeResult::new("backend", HealthStatus::Healthy, Duration::ZERO)
            .with_detail("connected", true)
            .with_detail("clients", 3usize)
            .with_detail("cpu", 1.5f64)
            .with_detail("state", "running")
            .with_error("");

        assert_eq!(result.details["connected"], DetailValue::Bool(true));
        assert_eq!(result.details["clients"], DetailValue::Integer(3));
        assert_eq!(result.details["cpu"], DetailValue::Float(1.5));
        assert_eq!(result.details["state"], DetailValue::Text("running".to_string()));
        assert!(result.error.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["details"]["connected"], true);
        assert_eq!(json["details"]["clients"], 3);
        assert_eq!(json["details"]["state"], "running");
    }

    #[test]
    fn test_timed_out_sentinel() {
        let result = ProbeResult::timed_out("gateway", Duration::from_millis(1000));
        assert_eq!(result.status, HealthStatus::Timeout);
        assert_eq!(result.error.as_deref(), Some(TIMEOUT_ERROR));
        assert_eq!(result.response_time_ms(), 1000);
    }

    #[tokio::test]
    async fn test_race_deadline_returns_partial_results() {
        let tasks = vec![
            ("fast".to_string(), tokio::time::sleep(Duration::from_millis(5))),
            ("slow".to_string(), tokio::time::sleep(Duration::from_secs(5))),
        ];

        let start = Instant::now();
        let collected = race_deadline(tasks, Duration::from_millis(100)).await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(collected.completed.contains_key("fast"));
        assert_eq!(collected.pending, vec!["slow".to_string()]);
    }

    #[tokio::test]
    async fn test_race_deadline_returns_early_when_all_complete() {
        let tasks: Vec<(String, _)> = (0..5)
            .map(|i| (format!("task-{}", i), async move { i * 2 }))
            .collect();

        let start = Instant::now();
        let collected = race_deadline(tasks, Duration::from_secs(5)).await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(collected.completed.len(), 5);
        assert_eq!(collected.completed["task-3"], 6);
        assert!(collected.pending.is_empty());
    }

    #[tokio::test]
    async fn test_parallel_run_fills_timeouts_for_slow_probes() {
        let budget = Duration::from_millis(100);
        let aggregator = ProbeAggregator::new(
            vec![
                ScriptedProbe::new("fast", HealthStatus::Healthy, Duration::from_millis(5)),
                ScriptedProbe::new("failing", HealthStatus::Unhealthy, Duration::ZERO),
                ScriptedProbe::new("slow", HealthStatus::Healthy, Duration::from_secs(10)),
            ],
            budget,
        );

        let results = aggregator.run_parallel().await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["fast"].status, HealthStatus::Healthy);
        assert_eq!(results["failing"].status, HealthStatus::Unhealthy);

        let slow = &results["slow"];
        assert_eq!(slow.status, HealthStatus::Timeout);
        assert_eq!(slow.error.as_deref(), Some("Health check timed out"));
        assert_eq!(slow.response_time_ms(), 100);
        assert_eq!(slow.name, "slow");
    }

    #[tokio::test]
    async fn test_parallel_run_has_no_timeouts_when_all_finish() {
        let aggregator = ProbeAggregator::new(
            vec![
                ScriptedProbe::new("a", HealthStatus::Healthy, Duration::from_millis(10)),
                ScriptedProbe::new("b", HealthStatus::Warning, Duration::from_millis(20)),
                ScriptedProbe::new("c", HealthStatus::Healthy, Duration::ZERO),
            ],
            Duration::from_secs(2),
        );

        let results = aggregator.run_parallel().await;

        assert_eq!(results.len(), 3);
        assert!(results.values().all(|r| r.status != HealthStatus::Timeout));
    }

    #[tokio::test]
    async fn test_parallel_run_survives_panicking_probe() {
        let aggregator = ProbeAggregator::new(
            vec![
                ScriptedProbe::new("ok", HealthStatus::Healthy, Duration::ZERO),
                Arc::new(PanickingProbe),
            ],
            Duration::from_millis(200),
        );

        let results = aggregator.run_parallel().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results["ok"].status, HealthStatus::Healthy);
        assert_eq!(results["panicking"].status, HealthStatus::Timeout);
    }

    #[tokio::test]
    async fn test_sequential_run_reports_every_probe() {
        let aggregator = ProbeAggregator::new(
            vec![
                ScriptedProbe::new("a", HealthStatus::Healthy, Duration::ZERO),
                ScriptedProbe::new("b", HealthStatus::Critical, Duration::ZERO),
            ],
            Duration::from_millis(1),
        );

        let results = aggregator.run_sequential().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results["b"].status, HealthStatus::Critical);
    }

    #[test]
    fn test_reduce_probe_statuses() {
        use HealthStatus::*;

        assert_eq!(reduce_statuses(std::iter::empty::<&HealthStatus>()), Healthy);
        assert_eq!(reduce_statuses(&[Healthy, Timeout]), Healthy);
        assert_eq!(reduce_statuses(&[Healthy, Warning]), Warning);
        assert_eq!(reduce_statuses(&[Warning, Unhealthy]), Unhealthy);
        assert_eq!(reduce_statuses(&[Critical, Healthy]), Unhealthy);
    }

    #[test]
    fn test_reduce_is_order_independent() {
        use HealthStatus::*;

        let statuses = [Healthy, Warning, Timeout, Unhealthy];
        let expected = reduce_statuses(&statuses);

        for a in 0..statuses.len() {
            for b in 0..statuses.len() {
                let mut permuted = statuses;
                permuted.swap(a, b);
                assert_eq!(reduce_statuses(&permuted), expected);
                permuted.reverse();
                assert_eq!(reduce_statuses(&permuted), expected);
            }
        }
        assert_eq!(expected, Unhealthy);
    }

    #[test]
    fn test_resource_thresholds_force_critical() {
        let services = results(&[
            ("backend", HealthStatus::Healthy),
            ("database", HealthStatus::Healthy),
        ]);
        let thresholds = ResourceThresholds::default();

        let mut metrics = MetricsSnapshot::default();
        assert_eq!(reduce(&services, &metrics, &thresholds), HealthStatus::Healthy);

        metrics.memory.usage_percent = 96.0;
        assert_eq!(reduce(&services, &metrics, &thresholds), HealthStatus::Critical);

        metrics = MetricsSnapshot::default();
        metrics.cpu.usage_percent = 90.5;
        assert_eq!(reduce(&services, &metrics, &thresholds), HealthStatus::Critical);

        metrics = MetricsSnapshot::default();
        metrics.disk.usage_percent = 95.0;
        assert_eq!(reduce(&services, &metrics, &thresholds), HealthStatus::Healthy);
        metrics.disk.usage_percent = 95.1;
        assert_eq!(reduce(&services, &metrics, &thresholds), HealthStatus::Critical);
    }

    #[tokio::test]
    async fn test_database_probe_without_handle_is_critical() {
        let result = DatabaseProbe::new(None).run().await;

        assert_eq!(result.status, HealthStatus::Critical);
        assert!(result.error.as_deref().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_database_probe_mapping() {
        let result = DatabaseProbe::new(Some(Arc::new(FakeDatabase::unreachable()))).run().await;
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.unwrap().contains("connection refused"));

        let result = DatabaseProbe::new(Some(Arc::new(FakeDatabase::healthy()))).run().await;
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.details["connection"], DetailValue::Text("active".to_string()));
        assert_eq!(result.details["open_connections"], DetailValue::Integer(3));
        assert_eq!(result.details["in_use"], DetailValue::Integer(1));
        assert_eq!(result.details["idle"], DetailValue::Integer(2));
    }

    #[tokio::test]
    async fn test_message_hub_probe() {
        let result = MessageHubProbe::new(None).run().await;
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.is_some());

        let hub: Arc<dyn MessageHub> = Arc::new(FakeHub { clients: 7, endpoints: 4 });
        let result = MessageHubProbe::new(Some(hub)).run().await;
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.details["active_clients"], DetailValue::Integer(7));
        assert_eq!(result.details["connected_endpoints"], DetailValue::Integer(4));
    }

    #[tokio::test]
    async fn test_backend_probe_reports_process_details() {
        let metrics: Arc<dyn MetricsSource> = Arc::new(FakeMetrics::nominal());
        let result = BackendProbe::new(Some(metrics), "1.0.0".to_string(), Instant::now())
            .run()
            .await;

        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.details["memory_usage"], DetailValue::Integer(2048));
        assert_eq!(result.details["version"], DetailValue::Text("1.0.0".to_string()));
        assert_eq!(result.details["worker_threads"], DetailValue::Integer(1));

        let result = BackendProbe::new(None, "1.0.0".to_string(), Instant::now()).run().await;
        assert_eq!(result.status, HealthStatus::Healthy);
        assert!(!result.details.contains_key("memory_usage"));
    }

    #[tokio::test]
    async fn test_gateway_probe_without_client() {
        let result = gateway_probe(None, GatewayCheck::CoreStatus).run().await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.is_some());
        assert_eq!(result.details["gateway_host"], DetailValue::Text("10.0.0.5:5038".to_string()));
        assert_eq!(result.details["connection_status"], DetailValue::Text("failed".to_string()));
    }

    #[tokio::test]
    async fn test_gateway_probe_disconnected_reports_last_contact() {
        let last_contact = Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 0).unwrap();
        let mut gateway = FakeGateway::ok();
        gateway.connected = false;
        gateway.last_contact = Some(last_contact);
        let gateway = Arc::new(gateway);

        let result = gateway_probe(Some(gateway.clone()), GatewayCheck::Liveness).run().await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert_eq!(result.details["gateway_connected"], DetailValue::Bool(false));
        assert_eq!(result.details["last_contact"], DetailValue::Text(last_contact.to_rfc3339()));
        assert!(gateway.actions.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_gateway_is_reconnected_before_check() {
        let mut gateway = FakeGateway::ok();
        gateway.connected = false;
        gateway.reconnects = true;
        let gateway = Arc::new(gateway);

        let result = gateway_probe(Some(gateway.clone()), GatewayCheck::Liveness).run().await;

        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.details["ping_success"], DetailValue::Bool(true));
        assert_eq!(*gateway.actions.lock(), vec!["Ping".to_string()]);
    }

    #[tokio::test]
    async fn test_gateway_probe_negative_ack_is_warning() {
        let gateway = Arc::new(FakeGateway::replying(Ok(GatewayResponse {
            success: false,
            error: Some("Permission denied".to_string()),
        })));

        let result = gateway_probe(Some(gateway), GatewayCheck::CoreStatus).run().await;

        assert_eq!(result.status, HealthStatus::Warning);
        assert!(result.error.is_some());
        assert_eq!(result.details["command_error"], DetailValue::Text("Permission denied".to_string()));
    }

    #[tokio::test]
    async fn test_gateway_probe_command_failure_is_unhealthy() {
        let gateway = Arc::new(FakeGateway::replying(Err(GatewayError::Io("broken pipe".to_string()))));

        let result = gateway_probe(Some(gateway), GatewayCheck::Liveness).run().await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.unwrap().contains("broken pipe"));
    }

    #[tokio::test]
    async fn test_gateway_probe_bounds_slow_commands() {
        let mut gateway = FakeGateway::ok();
        gateway.delay = Duration::from_secs(10);

        let start = Instant::now();
        let result = gateway_probe(Some(Arc::new(gateway)), GatewayCheck::CoreStatus).run().await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_gateway_probe_variants_issue_different_commands() {
        let gateway = Arc::new(FakeGateway::ok());

        let liveness = gateway_probe(Some(gateway.clone()), GatewayCheck::Liveness).run().await;
        let full = gateway_probe(Some(gateway.clone()), GatewayCheck::CoreStatus).run().await;

        assert_eq!(*gateway.actions.lock(), vec!["Ping".to_string(), "CoreStatus".to_string()]);

        assert_eq!(liveness.status, HealthStatus::Healthy);
        assert_eq!(liveness.details["ping_success"], DetailValue::Bool(true));
        assert!(liveness.details.contains_key("round_trip_ms"));
        assert!(liveness.details.contains_key("last_ping"));

        assert_eq!(full.status, HealthStatus::Healthy);
        assert_eq!(full.details["core_status"], DetailValue::Text("running".to_string()));
        assert!(full.details.contains_key("round_trip_ms"));
        assert!(!full.details.contains_key("ping_success"));
    }

    #[tokio::test]
    async fn test_metrics_collector_computes_usage() {
        let hub: Arc<dyn MessageHub> = Arc::new(FakeHub { clients: 5, endpoints: 1 });
        let collector = SystemMetricsCollector::new(
            Arc::new(FakeMetrics::nominal()),
            Some(hub),
            Duration::from_millis(1),
        );

        let snapshot = collector.collect().await;

        assert_eq!(snapshot.cpu.usage_percent, 12.5);
        assert_eq!(snapshot.cpu.cores, 4);
        assert_eq!(snapshot.cpu.load_avg, vec![0.5, 0.4, 0.3]);
        assert_eq!(snapshot.memory.usage_percent, 40.0);
        assert_eq!(snapshot.disk.used_bytes, 250);
        assert_eq!(snapshot.disk.usage_percent, 25.0);
        assert_eq!(snapshot.network.active_realtime_clients, 5);
    }

    #[tokio::test]
    async fn test_metrics_collector_zeroes_failed_samples() {
        let source = FakeMetrics {
            cpu_percent: 33.0,
            ..FakeMetrics::default()
        };
        let collector = SystemMetricsCollector::new(Arc::new(source), None, Duration::from_millis(1));

        let snapshot = collector.collect().await;

        assert_eq!(snapshot.cpu.usage_percent, 33.0);
        assert_eq!(snapshot.memory.total_bytes, 0);
        assert_eq!(snapshot.memory.usage_percent, 0.0);
        assert_eq!(snapshot.disk.total_bytes, 0);
        assert_eq!(snapshot.network.active_realtime_clients, 0);
    }

    #[tokio::test]
    async fn test_metrics_collector_keeps_runtime_free_during_disk_sample() {
        let source = FakeMetrics {
            disk_delay: Duration::from_millis(300),
            ..FakeMetrics::nominal()
        };
        let collector = SystemMetricsCollector::new(Arc::new(source), None, Duration::from_millis(1));

        let start = Instant::now();
        let ticker = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            start.elapsed()
        });

        let snapshot = collector.collect().await;
        let ticked_after = ticker.await.unwrap();

        assert_eq!(snapshot.disk.usage_percent, 25.0);
        assert!(ticked_after < Duration::from_millis(200), "timer stalled for {:?}", ticked_after);
    }

    #[tokio::test]
    async fn test_persisted_state_collection() {
        let entities = vec!["users".to_string(), "active_calls".to_string(), "call_logs".to_string()];

        let state = PersistedStateCollector::new(None, entities.clone()).collect().await;
        assert_eq!(state.status, HealthStatus::Unhealthy);
        assert!(state.record_counts.values().all(|count| *count == 0));
        assert_eq!(state.record_counts.len(), 3);

        let db: Arc<dyn DatabaseHandle> = Arc::new(FakeDatabase::healthy());
        let state = PersistedStateCollector::new(Some(db), entities).collect().await;
        assert_eq!(state.status, HealthStatus::Healthy);
        assert_eq!(state.record_counts["users"], 12);
        assert_eq!(state.record_counts["active_calls"], 0);
        assert_eq!(state.record_counts["call_logs"], 340);
        assert_eq!(state.database_size, "1.5 KB");
    }

    #[tokio::test]
    async fn test_full_report_with_null_database() {
        let collaborators = Collaborators {
            database: None,
            ..full_collaborators()
        };
        let service = HealthService::new(collaborators, &health_config(500, 500), &GatewayConfig::default(), app_info());

        let report = service.full_report().await;

        assert_eq!(report.services.len(), 4);
        for name in [BACKEND, DATABASE, MESSAGE_HUB, TELEPHONY_GATEWAY] {
            assert!(report.services.contains_key(name), "missing {}", name);
        }
        let database = &report.services[DATABASE];
        assert_eq!(database.status, HealthStatus::Critical);
        assert!(database.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.database_health.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_full_report_times_out_slow_gateway() {
        let mut gateway = FakeGateway::ok();
        gateway.delay = Duration::from_secs(10);
        let collaborators = Collaborators {
            gateway: Some(Arc::new(gateway)),
            ..full_collaborators()
        };
        let gateway_config = GatewayConfig {
            command_timeout_ms: 60_000,
            ..GatewayConfig::default()
        };
        let service = HealthService::new(collaborators, &health_config(150, 100), &gateway_config, app_info());

        let start = Instant::now();
        let report = service.full_report().await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(report.services.len(), 4);
        let gateway = &report.services[TELEPHONY_GATEWAY];
        assert_eq!(gateway.status, HealthStatus::Timeout);
        assert_eq!(gateway.response_time_ms(), 150);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_full_report_leaves_metrics_zeroed_on_timeout() {
        let metrics = FakeMetrics {
            cpu_delay: Duration::from_secs(10),
            ..FakeMetrics::nominal()
        };
        let collaborators = Collaborators {
            metrics: Some(Arc::new(metrics)),
            ..full_collaborators()
        };
        let service = HealthService::new(collaborators, &health_config(500, 50), &GatewayConfig::default(), app_info());

        let report = service.full_report().await;

        assert_eq!(report.system_metrics, MetricsSnapshot::default());
        assert_eq!(report.database_health.status, HealthStatus::Healthy);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_full_report_marks_slow_database_collection_as_timeout() {
        let mut database = FakeDatabase::healthy();
        database.count_delay = Duration::from_secs(10);
        let collaborators = Collaborators {
            database: Some(Arc::new(database)),
            ..full_collaborators()
        };
        let service = HealthService::new(collaborators, &health_config(500, 200), &GatewayConfig::default(), app_info());

        let start = Instant::now();
        let report = service.full_report().await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(report.database_health.status, HealthStatus::Timeout);
        assert!(report.database_health.record_counts.is_empty());
        assert_eq!(report.database_health.database_size, "");
        assert_eq!(report.services[DATABASE].status, HealthStatus::Healthy);
        assert_eq!(report.system_metrics.memory.usage_percent, 40.0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["database_health"]["status"], "timeout");
    }

    #[tokio::test]
    async fn test_resource_exhaustion_dominates_healthy_probes() {
        let mut metrics = FakeMetrics::nominal();
        metrics.memory = Some(MemorySample {
            total_bytes: 100,
            used_bytes: 96,
            available_bytes: 4,
        });
        let collaborators = Collaborators {
            metrics: Some(Arc::new(metrics)),
            ..full_collaborators()
        };
        let service = HealthService::new(collaborators, &health_config(500, 500), &GatewayConfig::default(), app_info());

        let report = service.full_report().await;

        assert!(report.services.values().all(|r| r.status == HealthStatus::Healthy));
        assert_eq!(report.status, HealthStatus::Critical);
    }

    #[tokio::test]
    async fn test_fast_and_full_paths_agree() {
        let scenarios: Vec<Collaborators> = vec![
            full_collaborators(),
            Collaborators {
                database: None,
                ..full_collaborators()
            },
            Collaborators {
                gateway: Some(Arc::new(FakeGateway::replying(Ok(GatewayResponse {
                    success: false,
                    error: None,
                })))),
                ..full_collaborators()
            },
            Collaborators {
                hub: None,
                gateway: None,
                ..full_collaborators()
            },
        ];

        for collaborators in scenarios {
            let service = HealthService::new(collaborators, &health_config(500, 500), &GatewayConfig::default(), app_info());

            let fast = service.fast_report().await;
            let full = service.full_report().await;

            assert_eq!(fast.status, full.status);
            assert_eq!(
                fast.services.keys().collect::<Vec<_>>(),
                full.services.keys().collect::<Vec<_>>()
            );
            for (name, result) in &fast.services {
                assert_eq!(result.status, full.services[name].status, "probe {}", name);
            }
        }
    }

    #[tokio::test]
    async fn test_report_metadata_and_response_shape() {
        let service = HealthService::new(full_collaborators(), &health_config(500, 500), &GatewayConfig::default(), app_info());

        let report = service.fast_report().await;
        assert_eq!(report.uptime, "2 hours, 1 minutes");
        assert_eq!(report.version, "1.0.0");
        assert_eq!(report.environment, "test");
        assert_eq!(report.database_health.database_size, "1.5 KB");

        let json = serde_json::to_value(HealthResponse::from(report)).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["response_time_ms"].is_u64());
        for key in [
            "timestamp",
            "status",
            "services",
            "system_metrics",
            "database_health",
            "uptime",
            "version",
            "environment",
        ] {
            assert!(json["health"].get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["health"]["services"].as_object().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_report_without_any_collaborators() {
        let service = HealthService::new(
            Collaborators::default(),
            &health_config(200, 100),
            &GatewayConfig::default(),
            app_info(),
        );

        let report = service.full_report().await;

        assert_eq!(report.services.len(), 4);
        assert_eq!(report.services[BACKEND].status, HealthStatus::Healthy);
        assert_eq!(report.services[DATABASE].status, HealthStatus::Critical);
        assert_eq!(report.uptime, "Unavailable");
        assert_eq!(report.system_metrics, MetricsSnapshot::default());
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }
}
