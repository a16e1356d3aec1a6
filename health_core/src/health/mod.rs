//! Bounded-time health aggregation: probes, metrics collectors, reducer and report

pub mod aggregator;
pub mod collaborators;
pub mod format;
pub mod metrics;
pub mod persisted;
pub mod probe;
pub mod probes;
pub mod reducer;
pub mod report;
pub mod status;

#[cfg(test)]
mod tests;

pub use aggregator::{race_deadline, Collected, ProbeAggregator};
pub use collaborators::{
    DatabaseHandle, DiskSample, GatewayClient, GatewayResponse, MemorySample, MessageHub,
    MetricsSource, PoolStats, ProcessSample,
};
pub use format::{format_bytes, format_uptime};
pub use metrics::{MetricsSnapshot, SystemMetricsCollector};
pub use persisted::{PersistedStateCollector, PersistedStateHealth};
pub use probe::{DetailValue, Probe, ProbeResult, TIMEOUT_ERROR};
pub use probes::{BackendProbe, DatabaseProbe, GatewayCheck, GatewayProbe, MessageHubProbe};
pub use reducer::{reduce, reduce_statuses, ResourceThresholds};
pub use report::{Collaborators, HealthReport, HealthResponse, HealthService};
pub use status::HealthStatus;
