use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::time::Duration;
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::health::{DatabaseHandle, PoolStats};

#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Only plain identifiers may be interpolated into a count query.
fn is_identifier(entity: &str) -> bool {
    let mut chars = entity.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait::async_trait]
impl DatabaseHandle for SqliteDatabase {
    async fn ping(&self) -> Result<()> {
        let row = sqlx::query("SELECT 1 as test")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database ping failed: {}", e);
                AppError::from(e)
            })?;

        let test_value: i32 = row.try_get("test")?;

        if test_value == 1 {
            Ok(())
        } else {
            Err(AppError::Database(format!("unexpected ping result {}", test_value)))
        }
    }

    fn pool_stats(&self) -> PoolStats {
        let open_connections = self.pool.size();
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);
        PoolStats {
            open_connections,
            idle,
            in_use: open_connections.saturating_sub(idle),
        }
    }

    async fn count_rows(&self, entity: &str) -> Result<i64> {
        if !is_identifier(entity) {
            return Err(AppError::Database(format!("invalid entity name '{}'", entity)));
        }

        let query = format!("SELECT COUNT(*) AS total FROM \"{}\"", entity);
        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(row.try_get("total")?)
    }

    async fn storage_size_bytes(&self) -> Result<i64> {
        let row = sqlx::query(
            "SELECT page_count * page_size AS db_size FROM pragma_page_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("db_size")?)
    }
}

pub async fn get_database_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    info!("Connecting to database: {}", config.url);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(300))
        .test_before_acquire(true)
        .connect(&config.url)
        .await
        .map_err(|e| {
            error!("Failed to create database pool: {}", e);
            AppError::from(e)
        })?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await
        .map_err(AppError::from)?;

    sqlx::query("PRAGMA busy_timeout = 30000")
        .execute(&pool)
        .await
        .map_err(AppError::from)?;

    info!("Database connection pool created successfully");
    Ok(pool)
}
