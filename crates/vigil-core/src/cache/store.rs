//! Durable backing store for cold cache lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use vigil_types::ResilienceError;

/// A value as persisted, with its own freshness timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub value: Value,
    pub refreshed_at: DateTime<Utc>,
    pub source_block: Option<u64>,
}

impl StoredEntry {
    pub fn new(value: Value, source_block: Option<u64>) -> Self {
        Self { value, refreshed_at: Utc::now(), source_block }
    }

    /// Remaining freshness under `ttl`, or `None` if already stale.
    pub fn remaining_ttl(&self, ttl: Duration, now: DateTime<Utc>) -> Option<Duration> {
        let age = now.signed_duration_since(self.refreshed_at).to_std().unwrap_or(Duration::ZERO);
        ttl.checked_sub(age).filter(|remaining| !remaining.is_zero())
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    async fn load(&self, key: &str) -> Result<Option<StoredEntry>, ResilienceError>;

    async fn save(&self, key: &str, entry: &StoredEntry) -> Result<(), ResilienceError>;

    /// Drop entries sourced at or above `block`. Returns the number removed.
    async fn delete_from_block(&self, block: u64) -> Result<u64, ResilienceError>;
}

/// PostgreSQL store over the `resilience_cache` table.
#[derive(Debug, Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), ResilienceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resilience_cache (
                key TEXT PRIMARY KEY,
                value JSONB NOT NULL,
                refreshed_at TIMESTAMPTZ NOT NULL,
                source_block BIGINT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS resilience_cache_source_block_idx ON resilience_cache (source_block)",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

fn storage_error(e: sqlx::Error) -> ResilienceError {
    ResilienceError::storage(e.to_string())
}

fn to_db_block(block: u64) -> i64 {
    i64::try_from(block).unwrap_or(i64::MAX)
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn load(&self, key: &str) -> Result<Option<StoredEntry>, ResilienceError> {
        let row: Option<(Value, DateTime<Utc>, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT value, refreshed_at, source_block
            FROM resilience_cache
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(|(value, refreshed_at, source_block)| StoredEntry {
            value,
            refreshed_at,
            source_block: source_block.and_then(|b| u64::try_from(b).ok()),
        }))
    }

    async fn save(&self, key: &str, entry: &StoredEntry) -> Result<(), ResilienceError> {
        sqlx::query(
            r#"
            INSERT INTO resilience_cache (key, value, refreshed_at, source_block)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                refreshed_at = EXCLUDED.refreshed_at,
                source_block = EXCLUDED.source_block
            "#,
        )
        .bind(key)
        .bind(&entry.value)
        .bind(entry.refreshed_at)
        .bind(entry.source_block.map(to_db_block))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn delete_from_block(&self, block: u64) -> Result<u64, ResilienceError> {
        let result = sqlx::query("DELETE FROM resilience_cache WHERE source_block >= $1")
            .bind(to_db_block(block))
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected())
    }
}
