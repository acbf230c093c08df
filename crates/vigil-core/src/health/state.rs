//! Per-resource health and breaker record.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use vigil_types::{CircuitState, HealthConfig, HealthSnapshot, ResourceKind, ResourceStatus};

/// Transition of the `is_healthy` flag caused by one recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HealthTransition {
    BecameUnhealthy,
    Recovered,
}

#[derive(Debug)]
pub(crate) struct ResourceState {
    pub(crate) kind: Option<ResourceKind>,
    pub(crate) is_healthy: bool,
    pub(crate) consecutive_failures: u32,
    pub(crate) consecutive_successes: u32,
    pub(crate) last_checked_at: Option<DateTime<Utc>>,
    pub(crate) last_latency_ms: Option<u64>,
    /// Last unhealthy -> healthy transition
    pub(crate) recovered_at: Option<Instant>,
    pub(crate) total_successes: u64,
    pub(crate) total_failures: u64,

    pub(crate) circuit: CircuitState,
    /// Failures counted toward the breaker threshold (may exclude rate limits)
    pub(crate) breaker_failures: u32,
    pub(crate) open_until: Option<Instant>,
    pub(crate) probe_in_flight: bool,

    issued_tickets: u64,
    applied_ticket: u64,
}

impl ResourceState {
    pub(crate) fn new(kind: Option<ResourceKind>) -> Self {
        Self {
            kind,
            is_healthy: true,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_checked_at: None,
            last_latency_ms: None,
            recovered_at: None,
            total_successes: 0,
            total_failures: 0,
            circuit: CircuitState::Closed,
            breaker_failures: 0,
            open_until: None,
            probe_in_flight: false,
            issued_tickets: 0,
            applied_ticket: 0,
        }
    }

    pub(crate) fn issue_ticket(&mut self) -> u64 {
        self.issued_tickets = self.issued_tickets.saturating_add(1);
        self.issued_tickets
    }

    /// Returns false when an outcome from a later attempt was already applied.
    pub(crate) fn accept_ticket(&mut self, ticket: u64) -> bool {
        if ticket < self.applied_ticket {
            return false;
        }
        self.applied_ticket = ticket;
        true
    }

    pub(crate) fn record_health(
        &mut self,
        success: bool,
        latency_ms: u64,
        config: &HealthConfig,
    ) -> Option<HealthTransition> {
        self.last_checked_at = Some(Utc::now());
        self.last_latency_ms = Some(latency_ms);

        if success {
            self.consecutive_failures = 0;
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            self.total_successes = self.total_successes.saturating_add(1);

            if !self.is_healthy && self.consecutive_successes >= config.recovery_threshold.max(1) {
                self.is_healthy = true;
                self.recovered_at = Some(Instant::now());
                return Some(HealthTransition::Recovered);
            }
        } else {
            self.consecutive_successes = 0;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.total_failures = self.total_failures.saturating_add(1);

            if self.is_healthy && self.consecutive_failures >= config.failure_threshold.max(1) {
                self.is_healthy = false;
                return Some(HealthTransition::BecameUnhealthy);
            }
        }
        None
    }

    pub(crate) fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        match self.circuit {
            CircuitState::Open => self.open_until.map(|until| until.saturating_duration_since(now)),
            CircuitState::Closed => None,
        }
    }

    pub(crate) fn to_snapshot(&self, resource_id: &str) -> HealthSnapshot {
        HealthSnapshot {
            resource_id: resource_id.to_string(),
            healthy: self.is_healthy,
            latency_ms: self.last_latency_ms,
            last_checked_at: self.last_checked_at,
        }
    }

    pub(crate) fn to_status(&self, resource_id: &str, now: Instant) -> ResourceStatus {
        ResourceStatus {
            resource_id: resource_id.to_string(),
            kind: self.kind,
            healthy: self.is_healthy,
            circuit: self.circuit,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            latency_ms: self.last_latency_ms,
            last_checked_at: self.last_checked_at,
            cooldown_remaining_ms: self
                .cooldown_remaining(now)
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            total_successes: self.total_successes,
            total_failures: self.total_failures,
        }
    }
}
