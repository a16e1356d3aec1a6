//! Point-in-time system resource snapshot.
//!
//! Collection never fails. Each sub-fetch that errors leaves its section at zero.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::collaborators::{MessageHub, MetricsSource};
use crate::error::MetricsError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CpuMetrics {
    pub usage_percent: f64,
    pub cores: usize,
    pub load_avg: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryMetrics {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiskMetrics {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkMetrics {
    pub active_realtime_clients: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
}

/// Root filesystem for the host OS family.
pub fn root_path() -> &'static Path {
    if cfg!(windows) {
        Path::new("C:\\")
    } else {
        Path::new("/")
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

#[derive(Clone)]
pub struct SystemMetricsCollector {
    source: Arc<dyn MetricsSource>,
    hub: Option<Arc<dyn MessageHub>>,
    cpu_window: Duration,
}

impl SystemMetricsCollector {
    pub fn new(source: Arc<dyn MetricsSource>, hub: Option<Arc<dyn MessageHub>>, cpu_window: Duration) -> Self {
        Self {
            source,
            hub,
            cpu_window,
        }
    }

    pub fn source(&self) -> &Arc<dyn MetricsSource> {
        &self.source
    }

    pub async fn collect(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();

        match self.source.cpu_usage(self.cpu_window).await {
            Ok(usage) => snapshot.cpu.usage_percent = usage,
            Err(e) => debug!("CPU usage unavailable: {}", e),
        }
        match self.source.core_count() {
            Ok(cores) => snapshot.cpu.cores = cores,
            Err(e) => debug!("Core count unavailable: {}", e),
        }
        match self.source.load_average() {
            Ok(load) => snapshot.cpu.load_avg = load,
            Err(e) => debug!("Load average unavailable: {}", e),
        }

        match self.source.memory() {
            Ok(memory) => {
                snapshot.memory = MemoryMetrics {
                    total_bytes: memory.total_bytes,
                    used_bytes: memory.used_bytes,
                    available_bytes: memory.available_bytes,
                    usage_percent: percent(memory.used_bytes, memory.total_bytes),
                };
            }
            Err(e) => debug!("Memory metrics unavailable: {}", e),
        }

        // Disk stats walk every mount with blocking syscalls.
        let source = Arc::clone(&self.source);
        let disk_sample = tokio::task::spawn_blocking(move || source.disk_usage(root_path()))
            .await
            .unwrap_or_else(|e| Err(MetricsError::Unavailable(format!("disk sampler stopped: {}", e))));

        match disk_sample {
            Ok(disk) => {
                let used_bytes = disk.total_bytes.saturating_sub(disk.free_bytes);
                snapshot.disk = DiskMetrics {
                    total_bytes: disk.total_bytes,
                    used_bytes,
                    free_bytes: disk.free_bytes,
                    usage_percent: percent(used_bytes, disk.total_bytes),
                };
            }
            Err(e) => debug!("Disk metrics unavailable: {}", e),
        }

        if let Some(hub) = &self.hub {
            snapshot.network.active_realtime_clients = hub.client_count().await;
        }

        debug!(
            "Collected system metrics: CPU: {:.1}%, Memory: {:.1}%, Disk: {:.1}%",
            snapshot.cpu.usage_percent, snapshot.memory.usage_percent, snapshot.disk.usage_percent
        );

        snapshot
    }
}
