//! Background liveness probing.

use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::HealthRegistry;
use crate::resource::{Candidate, ResourceHandle};
use crate::scheduler::PeriodicTask;

impl HealthRegistry {
    /// Probe every resource once, concurrently. Returns the number of healthy results.
    ///
    /// Probe outcomes go through the same ticketed path as real operations;
    /// a probe that finishes after a newer operation result is discarded.
    pub async fn probe_all(&self, resources: &[ResourceHandle]) -> usize {
        let timeout = self.config().probe_timeout();

        let probes = resources.iter().map(|resource| async move {
            let id = resource.resource_id();
            let ticket = self.begin_attempt(id);
            let success = match tokio::time::timeout(timeout, resource.probe()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    tracing::debug!(resource_id = %id, error = %e, "Probe failed");
                    false
                },
                Err(_) => {
                    tracing::debug!(
                        resource_id = %id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Probe timed out"
                    );
                    false
                },
            };
            self.complete_attempt(ticket, success);
            success
        });

        let healthy = join_all(probes).await.into_iter().filter(|ok| *ok).count();
        tracing::debug!(healthy, total = resources.len(), "Health probe round complete");
        healthy
    }

    /// Register `resources` and probe them every `check_interval` until `cancel` fires.
    pub fn start_prober(
        self: &Arc<Self>,
        resources: Vec<ResourceHandle>,
        cancel: CancellationToken,
    ) -> PeriodicTask {
        for resource in &resources {
            self.register(resource.resource_id(), resource.kind());
        }

        let registry = Arc::clone(self);
        let resources = Arc::new(resources);
        tracing::info!(
            "🏥 Health prober started (interval={}s, resources={})",
            self.config().check_interval().as_secs(),
            resources.len()
        );

        PeriodicTask::spawn("health-prober", self.config().check_interval(), cancel, move || {
            let registry = Arc::clone(&registry);
            let resources = Arc::clone(&resources);
            async move {
                registry.probe_all(&resources).await;
            }
        })
    }
}
