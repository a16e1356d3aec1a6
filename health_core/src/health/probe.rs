//! Probe contract and the immutable result every probe run produces

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::status::HealthStatus;

pub const TIMEOUT_ERROR: &str = "Health check timed out";

/// Closed set of value types a probe may attach to its details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DetailValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        DetailValue::Bool(value)
    }
}

impl From<i64> for DetailValue {
    fn from(value: i64) -> Self {
        DetailValue::Integer(value)
    }
}

impl From<u64> for DetailValue {
    fn from(value: u64) -> Self {
        DetailValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for DetailValue {
    fn from(value: usize) -> Self {
        DetailValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u32> for DetailValue {
    fn from(value: u32) -> Self {
        DetailValue::Integer(i64::from(value))
    }
}

impl From<f64> for DetailValue {
    fn from(value: f64) -> Self {
        DetailValue::Float(value)
    }
}

impl From<f32> for DetailValue {
    fn from(value: f32) -> Self {
        DetailValue::Float(f64::from(value))
    }
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        DetailValue::Text(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        DetailValue::Text(value)
    }
}

pub type Details = BTreeMap<String, DetailValue>;

/// Outcome of one probe invocation. The probe name is the key it is stored under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeResult {
    #[serde(skip)]
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    #[serde(rename = "response_time_ms", with = "duration_ms")]
    pub latency: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: Details,
}

impl ProbeResult {
    pub fn new(name: impl Into<String>, status: HealthStatus, latency: Duration) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
            latency,
            error: None,
            details: Details::new(),
        }
    }

    /// Sentinel for a probe that did not report within its budget.
    pub fn timed_out(name: impl Into<String>, budget: Duration) -> Self {
        Self::new(name, HealthStatus::Timeout, budget).with_error(TIMEOUT_ERROR)
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        self.error = (!error.is_empty()).then_some(error);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_checked_at(mut self, last_check: DateTime<Utc>) -> Self {
        self.last_check = last_check;
        self
    }

    pub fn response_time_ms(&self) -> u64 {
        u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A named health check against one collaborator.
///
/// `run` never fails: every collaborator failure is mapped onto a status.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> ProbeResult;
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
