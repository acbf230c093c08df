//! Circuit Breaker implementation for resource-level fast-fail behavior
//!
//! Prevents repeated calls to failing upstreams. After `max_failures`
//! consecutive failures the breaker for a resource opens and calls fail
//! immediately with [`ResilienceError::CircuitOpen`] without touching the
//! resource.
//!
//! States:
//! - Closed: Normal operation, requests pass through
//! - Open: Resource is failing, requests fail immediately until
//!   `reset_timeout` elapses; then exactly one probe is admitted
//!
//! There is no separate half-open state: the admitted probe is tracked by
//! a flag on the resource record and its outcome either closes the breaker
//! or reopens it with a fresh cooldown.
//!
//! Breaker state lives in the [`HealthRegistry`] record for the resource,
//! so health counters and breaker transitions for one resource are updated
//! under the same lock.

mod permit;


pub use permit::CircuitPermit;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vigil_types::{CircuitBreakerConfig, CircuitState, RateLimitPolicy, ResilienceError};

use crate::health::{HealthRegistry, ResourceState};
use crate::metrics;

/// Outcome of asking an open or closed breaker for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Pass,
    Probe,
    Rejected(Duration),
}

/// Breaker transition caused by a resolved attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BreakerTransition {
    Opened(u32),
    Reopened,
    Closed,
}

impl ResourceState {
    pub(crate) fn admit(&mut self, now: Instant) -> Admission {
        match self.circuit {
            CircuitState::Closed => Admission::Pass,
            CircuitState::Open => {
                let remaining = self.cooldown_remaining(now).unwrap_or(Duration::ZERO);
                if remaining.is_zero() && !self.probe_in_flight {
                    self.probe_in_flight = true;
                    Admission::Probe
                } else {
                    Admission::Rejected(remaining)
                }
            },
        }
    }

    pub(crate) fn breaker_success(&mut self) -> Option<BreakerTransition> {
        let was_open = self.circuit == CircuitState::Open;
        self.circuit = CircuitState::Closed;
        self.breaker_failures = 0;
        self.open_until = None;
        was_open.then_some(BreakerTransition::Closed)
    }

    /// `counts` is false for failures the rate-limit policy keeps off the threshold.
    pub(crate) fn breaker_failure(
        &mut self,
        probe: bool,
        counts: bool,
        config: &CircuitBreakerConfig,
        now: Instant,
    ) -> Option<BreakerTransition> {
        if probe {
            self.circuit = CircuitState::Open;
            self.open_until = Some(now + config.reset_timeout());
            return Some(BreakerTransition::Reopened);
        }
        // Already open: a straggler admitted before the trip must not extend the cooldown.
        if self.circuit == CircuitState::Open || !counts {
            return None;
        }

        self.breaker_failures = self.breaker_failures.saturating_add(1);
        if self.breaker_failures >= config.max_failures.max(1) {
            self.circuit = CircuitState::Open;
            self.open_until = Some(now + config.reset_timeout());
            return Some(BreakerTransition::Opened(self.breaker_failures));
        }
        None
    }
}

/// Per-resource breakers backed by the shared [`HealthRegistry`].
#[derive(Debug)]
pub struct CircuitBreaker {
    registry: Arc<HealthRegistry>,
    config: CircuitBreakerConfig,
    rate_limit: RateLimitPolicy,
    total_trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(
        registry: Arc<HealthRegistry>,
        config: CircuitBreakerConfig,
        rate_limit: RateLimitPolicy,
    ) -> Arc<Self> {
        Arc::new(Self { registry, config, rate_limit, total_trips: AtomicU64::new(0) })
    }

    pub fn registry(&self) -> &Arc<HealthRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        self.rate_limit
    }

    /// Admit one attempt against `resource_id`.
    ///
    /// Fails with `CircuitOpen` while the cooldown runs or while another
    /// probe is already in flight.
    pub fn try_acquire(&self, resource_id: &str) -> Result<CircuitPermit<'_>, ResilienceError> {
        let now = Instant::now();
        let admission = self.registry.with_state(resource_id, |state| state.admit(now));
        match admission {
            Admission::Pass => Ok(CircuitPermit::new(self, resource_id, false)),
            Admission::Probe => {
                debug!(resource_id = %resource_id, "Circuit breaker admitting probe");
                Ok(CircuitPermit::new(self, resource_id, true))
            },
            Admission::Rejected(remaining) => Err(ResilienceError::CircuitOpen {
                resource_id: resource_id.to_string(),
                retry_in_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Admit an attempt regardless of cooldown (last-resort candidate).
    ///
    /// Against an open breaker the attempt behaves as a probe: success
    /// closes it, failure reopens it with a fresh cooldown.
    pub fn force_acquire(&self, resource_id: &str) -> CircuitPermit<'_> {
        let claimed = self.registry.with_state(resource_id, |state| {
            if state.circuit == CircuitState::Open && !state.probe_in_flight {
                state.probe_in_flight = true;
                true
            } else {
                false
            }
        });
        debug!(resource_id = %resource_id, "Circuit breaker forcing last-resort attempt");
        CircuitPermit::new(self, resource_id, claimed)
    }

    /// Run `operation` under the breaker for `resource_id`. Does not retry.
    pub async fn execute<T, F, Fut>(&self, resource_id: &str, operation: F) -> Result<T, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError>>,
    {
        let permit = self.try_acquire(resource_id)?;
        let result = operation().await;
        permit.resolve(&result);
        result
    }

    pub fn state(&self, resource_id: &str) -> CircuitState {
        self.registry.with_state(resource_id, |state| state.circuit)
    }

    /// True while the breaker is open and its cooldown has not elapsed.
    pub fn is_open(&self, resource_id: &str) -> bool {
        let now = Instant::now();
        self.registry.with_state(resource_id, |state| {
            state.cooldown_remaining(now).is_some_and(|remaining| !remaining.is_zero())
        })
    }

    /// Manually close the breaker for a resource.
    pub fn reset(&self, resource_id: &str) {
        self.registry.with_state(resource_id, |state| {
            state.breaker_success();
            state.probe_in_flight = false;
        });
        info!(resource_id = %resource_id, "Circuit breaker manually reset");
    }

    pub fn total_trips(&self) -> u64 {
        self.total_trips.load(Ordering::Relaxed)
    }

    pub(crate) fn release_probe(&self, resource_id: &str) {
        self.registry.with_state(resource_id, |state| state.probe_in_flight = false);
    }

    /// Apply one resolved attempt to health counters and breaker state.
    pub(crate) fn record(
        &self,
        resource_id: &str,
        ticket_seq: u64,
        probe: bool,
        error: Option<&ResilienceError>,
        latency: Duration,
    ) {
        let now = Instant::now();
        let success = error.is_none();
        let counts = error.is_none_or(|e| !e.is_rate_limit() || self.rate_limit.trips_circuit);

        let (_, transition) =
            self.registry.apply_then(resource_id, ticket_seq, success, latency, |state| {
                if probe {
                    state.probe_in_flight = false;
                }
                if success {
                    state.breaker_success()
                } else {
                    state.breaker_failure(probe, counts, &self.config, now)
                }
            });

        metrics::record_attempt(resource_id, success, latency);

        match transition {
            Some(BreakerTransition::Opened(failures)) => {
                self.total_trips.fetch_add(1, Ordering::Relaxed);
                metrics::record_circuit_trip(resource_id);
                warn!(
                    resource_id = %resource_id,
                    failures,
                    reason = %error.map(ToString::to_string).unwrap_or_default(),
                    "🔌 Circuit breaker opening - too many failures"
                );
            },
            Some(BreakerTransition::Reopened) => {
                metrics::record_circuit_trip(resource_id);
                warn!(
                    resource_id = %resource_id,
                    reason = %error.map(ToString::to_string).unwrap_or_default(),
                    "🔌 Circuit breaker re-opening - probe failed"
                );
            },
            Some(BreakerTransition::Closed) => {
                info!(resource_id = %resource_id, "✅ Circuit breaker closing - resource recovered");
            },
            None => {},
        }
    }
}
