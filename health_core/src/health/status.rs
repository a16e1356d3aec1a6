use serde::{Deserialize, Serialize};

/// Status reported by a probe or derived for the whole report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
    Critical,
    Timeout,
}

impl HealthStatus {
    /// Rank used by the reducer. A timeout carries no signal and ranks with healthy.
    pub fn severity(self) -> u8 {
        match self {
            HealthStatus::Healthy | HealthStatus::Timeout => 0,
            HealthStatus::Warning => 1,
            HealthStatus::Unhealthy => 2,
            HealthStatus::Critical => 3,
        }
    }

    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Critical => "critical",
            HealthStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
