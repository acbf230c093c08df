//! Health Registry implementation.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vigil_types::{HealthConfig, HealthSnapshot, ResourceKind, ResourceStatus, StatusReport};

use super::state::{HealthTransition, ResourceState};
use crate::metrics;

/// Handle for one in-flight attempt against a resource.
///
/// Issued by [`HealthRegistry::begin_attempt`]; outcomes are applied in
/// ticket order per resource.
#[derive(Debug)]
pub struct AttemptTicket {
    resource_id: String,
    seq: u64,
    started: Instant,
}

impl AttemptTicket {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}

/// Process-local registry of resource health.
///
/// Constructed explicitly and shared by `Arc`; tests build isolated instances.
#[derive(Debug)]
pub struct HealthRegistry {
    resources: DashMap<String, Arc<Mutex<ResourceState>>>,
    config: HealthConfig,
}

impl HealthRegistry {
    pub fn new(config: HealthConfig) -> Arc<Self> {
        Arc::new(Self { resources: DashMap::new(), config })
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Register a resource up front so the status report knows its kind.
    pub fn register(&self, resource_id: &str, kind: ResourceKind) {
        self.with_state(resource_id, |state| state.kind = Some(kind));
    }

    pub(crate) fn slot(&self, resource_id: &str) -> Arc<Mutex<ResourceState>> {
        if let Some(existing) = self.resources.get(resource_id) {
            return Arc::clone(existing.value());
        }
        self.resources
            .entry(resource_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ResourceState::new(None))))
            .value()
            .clone()
    }

    /// Run `f` under the resource's lock, creating the record if absent.
    pub(crate) fn with_state<R>(&self, resource_id: &str, f: impl FnOnce(&mut ResourceState) -> R) -> R {
        let slot = self.slot(resource_id);
        let mut state = slot.lock();
        f(&mut state)
    }

    /// Current health; creates a default healthy entry for unknown ids.
    pub fn get_health(&self, resource_id: &str) -> HealthSnapshot {
        self.with_state(resource_id, |state| state.to_snapshot(resource_id))
    }

    /// Unknown resources are considered healthy.
    pub fn is_healthy(&self, resource_id: &str) -> bool {
        self.resources.get(resource_id).is_none_or(|slot| slot.lock().is_healthy)
    }

    pub fn begin_attempt(&self, resource_id: &str) -> AttemptTicket {
        let seq = self.with_state(resource_id, ResourceState::issue_ticket);
        AttemptTicket { resource_id: resource_id.to_string(), seq, started: Instant::now() }
    }

    /// Apply the outcome of a ticketed attempt.
    ///
    /// Returns false if a later attempt's outcome was already applied.
    pub fn complete_attempt(&self, ticket: AttemptTicket, success: bool) -> bool {
        let latency = ticket.elapsed();
        self.apply(&ticket.resource_id, ticket.seq, success, latency)
    }

    /// Record an outcome that was not ticketed up front (treated as newest).
    pub fn record_outcome(&self, resource_id: &str, success: bool, latency_ms: u64) {
        let seq = self.with_state(resource_id, ResourceState::issue_ticket);
        self.apply(resource_id, seq, success, Duration::from_millis(latency_ms));
    }

    pub(crate) fn apply(&self, resource_id: &str, seq: u64, success: bool, latency: Duration) -> bool {
        self.apply_then(resource_id, seq, success, latency, |_| ()).0
    }

    /// Apply a ticketed outcome, then run `then` under the same lock.
    ///
    /// `then` runs even when the health update is discarded as stale.
    pub(crate) fn apply_then<R>(
        &self,
        resource_id: &str,
        seq: u64,
        success: bool,
        latency: Duration,
        then: impl FnOnce(&mut ResourceState) -> R,
    ) -> (bool, R) {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let (applied, extra) = self.with_state(resource_id, |state| {
            let applied = state
                .accept_ticket(seq)
                .then(|| state.record_health(success, latency_ms, &self.config));
            (applied, then(state))
        });

        let accepted = match applied {
            None => {
                tracing::debug!(
                    resource_id = %resource_id,
                    ticket = seq,
                    "Discarding stale outcome (newer attempt already recorded)"
                );
                false
            },
            Some(transition) => {
                if let Some(transition) = transition {
                    self.log_transition(resource_id, transition);
                }
                true
            },
        };
        (accepted, extra)
    }

    fn log_transition(&self, resource_id: &str, transition: HealthTransition) {
        match transition {
            HealthTransition::BecameUnhealthy => {
                tracing::warn!(
                    resource_id = %resource_id,
                    threshold = self.config.failure_threshold,
                    "⛔ Resource marked unhealthy"
                );
                metrics::record_health_transition(resource_id, false);
            },
            HealthTransition::Recovered => {
                tracing::info!(resource_id = %resource_id, "🔄 Resource recovered");
                metrics::record_health_transition(resource_id, true);
            },
        }
    }

    /// Whether the resource transitioned back to healthy after `since`.
    pub(crate) fn recovered_since(&self, resource_id: &str, since: Instant) -> bool {
        self.resources
            .get(resource_id)
            .and_then(|slot| slot.lock().recovered_at)
            .is_some_and(|at| at > since)
    }

    pub fn status(&self, resource_id: &str) -> Option<ResourceStatus> {
        let now = Instant::now();
        self.resources.get(resource_id).map(|slot| slot.lock().to_status(resource_id, now))
    }

    /// Snapshot of every known resource for the status endpoint.
    pub fn snapshot(&self) -> StatusReport {
        let now = Instant::now();
        let resources: Vec<ResourceStatus> = self
            .resources
            .iter()
            .map(|entry| entry.value().lock().to_status(entry.key(), now))
            .collect();
        let report = StatusReport::from_resources(resources);
        metrics::update_resource_gauges(report.healthy_count, report.unhealthy_count);
        report
    }

    pub fn resource_ids(&self) -> Vec<String> {
        self.resources.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.resources.iter().filter(|e| e.value().lock().is_healthy).count()
    }
}
