//! Narrow capability interfaces for the systems the health engine observes.
//!
//! Handles are owned elsewhere and injected at construction. The engine only reads
//! through them; a missing handle is a valid observation, not an error.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::error::{GatewayError, MetricsError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub open_connections: u32,
    pub idle: u32,
    pub in_use: u32,
}

#[async_trait::async_trait]
pub trait DatabaseHandle: Send + Sync {
    async fn ping(&self) -> Result<()>;
    fn pool_stats(&self) -> PoolStats;
    async fn count_rows(&self, entity: &str) -> Result<i64>;
    async fn storage_size_bytes(&self) -> Result<i64>;
}

#[async_trait::async_trait]
pub trait MessageHub: Send + Sync {
    async fn client_count(&self) -> usize;
    async fn connected_endpoint_count(&self) -> usize;
}

/// Reply to a gateway action. `success == false` is a negative acknowledgment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayResponse {
    pub success: bool,
    pub error: Option<String>,
}

#[async_trait::async_trait]
pub trait GatewayClient: Send + Sync {
    fn is_connected(&self) -> bool;
    fn last_contact(&self) -> Option<DateTime<Utc>>;
    async fn send_command(&self, action: &str) -> std::result::Result<GatewayResponse, GatewayError>;

    /// Re-establishes a dropped session. Clients that cannot reconnect keep the default.
    async fn reconnect(&self) -> std::result::Result<(), GatewayError> {
        Err(GatewayError::NotConnected)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemorySample {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskSample {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessSample {
    pub resident_bytes: u64,
    pub cpu_percent: f32,
}

/// OS and runtime resource sampling.
#[async_trait::async_trait]
pub trait MetricsSource: Send + Sync {
    /// Aggregate usage across all cores, sampled over `window`.
    async fn cpu_usage(&self, window: Duration) -> std::result::Result<f64, MetricsError>;
    fn core_count(&self) -> std::result::Result<usize, MetricsError>;
    fn load_average(&self) -> std::result::Result<Vec<f64>, MetricsError>;
    fn memory(&self) -> std::result::Result<MemorySample, MetricsError>;
    fn disk_usage(&self, path: &Path) -> std::result::Result<DiskSample, MetricsError>;
    fn process_usage(&self) -> std::result::Result<ProcessSample, MetricsError>;
    fn host_uptime(&self) -> std::result::Result<Duration, MetricsError>;
}
