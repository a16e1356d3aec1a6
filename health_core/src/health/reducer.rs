//! Reduction of probe statuses and resource thresholds to one overall status

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::metrics::MetricsSnapshot;
use super::probe::ProbeResult;
use super::status::HealthStatus;
use crate::config::HealthConfig;

/// Resource levels above which the overall status is forced to critical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResourceThresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 90.0,
            memory_percent: 95.0,
            disk_percent: 95.0,
        }
    }
}

impl From<&HealthConfig> for ResourceThresholds {
    fn from(config: &HealthConfig) -> Self {
        Self {
            cpu_percent: config.cpu_critical_percent,
            memory_percent: config.memory_critical_percent,
            disk_percent: config.disk_critical_percent,
        }
    }
}

impl ResourceThresholds {
    pub fn exceeded_by(&self, metrics: &MetricsSnapshot) -> bool {
        metrics.cpu.usage_percent > self.cpu_percent
            || metrics.memory.usage_percent > self.memory_percent
            || metrics.disk.usage_percent > self.disk_percent
    }
}

/// What a single probe status contributes to the overall status.
/// A probe reporting critical only raises the aggregate to unhealthy.
fn contribution(status: HealthStatus) -> HealthStatus {
    match status {
        HealthStatus::Unhealthy | HealthStatus::Critical => HealthStatus::Unhealthy,
        HealthStatus::Warning => HealthStatus::Warning,
        HealthStatus::Healthy | HealthStatus::Timeout => HealthStatus::Healthy,
    }
}

/// Monotonic fold over the probe statuses; arrival order does not matter.
pub fn reduce_statuses<'a, I>(statuses: I) -> HealthStatus
where
    I: IntoIterator<Item = &'a HealthStatus>,
{
    statuses
        .into_iter()
        .map(|status| contribution(*status))
        .fold(HealthStatus::Healthy, |acc, next| {
            if next.severity() > acc.severity() {
                next
            } else {
                acc
            }
        })
}

pub fn reduce(
    services: &BTreeMap<String, ProbeResult>,
    metrics: &MetricsSnapshot,
    thresholds: &ResourceThresholds,
) -> HealthStatus {
    if thresholds.exceeded_by(metrics) {
        return HealthStatus::Critical;
    }

    reduce_statuses(services.values().map(|result| &result.status))
}
