//! Primary/replica routing per operation class.
//!
//! Reads and analytics try the replica first and fall back to the primary
//! when the replica is unhealthy or failing. Writes go to the primary only.
//! The order is fixed per call: a fallback to the primary does not make it
//! the preferred pool for later reads.
//! Each class runs up to `retries + 1` rounds of the fallback executor with
//! exponential backoff between rounds, every attempt bounded by the class
//! timeout.

use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use vigil_types::{OperationClass, PoolRouterConfig, ResilienceError};

use crate::fallback::{ExecutionContext, FallbackExecutor};
use crate::resource::{classify, DatabaseEndpoint, ResourceHandle};

#[derive(Debug)]
pub struct PoolRouter {
    primary: Arc<DatabaseEndpoint>,
    replica: Option<Arc<DatabaseEndpoint>>,
    executor: Arc<FallbackExecutor>,
    config: PoolRouterConfig,
}

impl PoolRouter {
    pub fn new(
        primary: Arc<DatabaseEndpoint>,
        replica: Option<Arc<DatabaseEndpoint>>,
        executor: Arc<FallbackExecutor>,
        config: PoolRouterConfig,
    ) -> Self {
        Self { primary, replica, executor, config }
    }

    pub fn primary(&self) -> &Arc<DatabaseEndpoint> {
        &self.primary
    }

    pub fn replica(&self) -> Option<&Arc<DatabaseEndpoint>> {
        self.replica.as_ref()
    }

    pub fn config(&self) -> &PoolRouterConfig {
        &self.config
    }

    pub fn handles(&self) -> Vec<ResourceHandle> {
        std::iter::once(&self.primary)
            .chain(self.replica.as_ref())
            .cloned()
            .map(ResourceHandle::Database)
            .collect()
    }

    /// Candidate pools for `class`, in priority order.
    pub fn candidates(&self, class: OperationClass) -> Vec<Arc<DatabaseEndpoint>> {
        match (class, &self.replica) {
            (OperationClass::Write, _) | (_, None) => vec![Arc::clone(&self.primary)],
            (OperationClass::Read | OperationClass::Analytics, Some(replica)) => {
                vec![Arc::clone(replica), Arc::clone(&self.primary)]
            },
        }
    }

    /// Run `operation` on the pool chosen for `class`.
    pub async fn execute<T, F, Fut>(&self, class: OperationClass, operation: F) -> Result<T, ResilienceError>
    where
        F: Fn(Arc<DatabaseEndpoint>) -> Fut,
        Fut: Future<Output = Result<T, ResilienceError>>,
    {
        let policy = self.config.policy(class);
        let candidates = self.candidates(class);
        let group = format!("db:{class}");
        let mut round: u32 = 0;

        loop {
            let ctx = ExecutionContext::new(group.clone()).with_timeout(policy.timeout()).without_preference();
            match self.executor.execute_with_fallback(&ctx, &candidates, &operation).await {
                Ok(value) => return Ok(value),
                Err(e) if round >= policy.retries || e == ResilienceError::Cancelled => return Err(e),
                Err(e) => {
                    let delay = self.executor.config().backoff_delay(round);
                    round += 1;
                    warn!(
                        group = %group,
                        round,
                        retries = policy.retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Database round failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }
    }

    /// [`Self::execute`] for plain sqlx queries; driver errors are classified per pool.
    pub async fn query<T, F, Fut>(&self, class: OperationClass, operation: F) -> Result<T, ResilienceError>
    where
        F: Fn(PgPool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let timeout = self.config.policy(class).timeout();
        self.execute(class, |db| {
            let query = operation(db.pool().clone());
            async move {
                query.await.map_err(|e| {
                    debug!(resource_id = %db.id(), error = %e, "Query failed");
                    classify::from_sqlx(db.id(), &e, timeout)
                })
            }
        })
        .await
    }
}
