//! PostgreSQL connection pool endpoint.

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use vigil_types::{ConfigError, ResilienceError};

use super::classify;

/// Role of a pool in the primary/replica topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseRole {
    Primary,
    Replica,
}

impl std::fmt::Display for DatabaseRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseRole::Primary => write!(f, "primary"),
            DatabaseRole::Replica => write!(f, "replica"),
        }
    }
}

/// A named connection pool tracked as one resource.
#[derive(Debug, Clone)]
pub struct DatabaseEndpoint {
    id: String,
    role: DatabaseRole,
    pool: PgPool,
    acquire_timeout: Duration,
}

impl DatabaseEndpoint {
    pub fn new(id: impl Into<String>, role: DatabaseRole, pool: PgPool, acquire_timeout: Duration) -> Self {
        Self { id: id.into(), role, pool, acquire_timeout }
    }

    /// Build a pool that connects on first use, so an unreachable replica
    /// does not block startup; the prober will mark it unhealthy.
    pub fn connect_lazy(
        id: impl Into<String>,
        role: DatabaseRole,
        database_url: &str,
        acquire_timeout: Duration,
    ) -> Result<Self, ResilienceError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(0)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(Duration::from_secs(300))
            .connect_lazy(database_url)
            .map_err(|e| ConfigError::invalid_value("database_url", "<redacted>", e))?;
        Ok(Self::new(id, role, pool, acquire_timeout))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> DatabaseRole {
        self.role
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn probe(&self) -> Result<(), ResilienceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| classify::from_sqlx(&self.id, &e, self.acquire_timeout))
    }
}
