//! Record counts and storage size of the persisted state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::collaborators::DatabaseHandle;
use super::format::format_bytes;
use super::status::HealthStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedStateHealth {
    pub status: HealthStatus,
    pub record_counts: BTreeMap<String, i64>,
    #[serde(skip)]
    pub storage_size_bytes: i64,
    pub database_size: String,
}

impl Default for PersistedStateHealth {
    /// What the report carries when collection did not finish in time.
    fn default() -> Self {
        Self {
            status: HealthStatus::Timeout,
            record_counts: BTreeMap::new(),
            storage_size_bytes: 0,
            database_size: String::new(),
        }
    }
}

#[derive(Clone)]
pub struct PersistedStateCollector {
    db: Option<Arc<dyn DatabaseHandle>>,
    entities: Vec<String>,
}

impl PersistedStateCollector {
    pub fn new(db: Option<Arc<dyn DatabaseHandle>>, entities: Vec<String>) -> Self {
        Self { db, entities }
    }

    pub async fn collect(&self) -> PersistedStateHealth {
        let mut record_counts: BTreeMap<String, i64> =
            self.entities.iter().map(|entity| (entity.clone(), 0)).collect();

        let Some(db) = &self.db else {
            return PersistedStateHealth {
                status: HealthStatus::Unhealthy,
                record_counts,
                ..PersistedStateHealth::default()
            };
        };

        for entity in &self.entities {
            match db.count_rows(entity).await {
                Ok(count) => {
                    record_counts.insert(entity.clone(), count);
                }
                Err(e) => debug!("Row count for '{}' unavailable: {}", entity, e),
            }
        }

        let storage_size_bytes = match db.storage_size_bytes().await {
            Ok(size) => size,
            Err(e) => {
                debug!("Storage size unavailable: {}", e);
                0
            }
        };

        PersistedStateHealth {
            status: HealthStatus::Healthy,
            record_counts,
            storage_size_bytes,
            database_size: format_bytes(storage_size_bytes),
        }
    }
}
