//! Ordered fallback across candidate resources.
//!
//! `execute_with_fallback` is the single retry/fallback policy used by the
//! RPC client, the gas oracle and the pool router:
//!
//! 1. Healthy candidates first (priority order kept), then the group's
//!    last-known-good resource moved to the front
//! 2. Candidates whose breaker is open are deferred; the highest-priority
//!    one is still tried as a last resort when everything else failed
//! 3. Each attempt runs under its breaker with a deadline and the caller's
//!    cancellation token
//! 4. A rate-limited failure waits an exponential backoff before the next
//!    attempt
//! 5. Only total exhaustion surfaces, as [`ResilienceError::Exhausted`]
//!
//! A cancelled call records nothing and leaves the sticky preference alone.
//! Contexts built with [`ExecutionContext::without_preference`] skip step 1's
//! sticky promotion and never record one.

mod backoff;
mod context;

#[cfg(test)]
mod tests;

pub use context::ExecutionContext;

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vigil_types::{CandidateFailure, FallbackConfig, ResilienceError};

use crate::circuit_breaker::{CircuitBreaker, CircuitPermit};
use crate::health::HealthRegistry;
use crate::metrics;
use crate::resource::Candidate;

/// Last resource that succeeded for a group.
#[derive(Debug, Clone)]
struct StickyChoice {
    resource_id: String,
    chosen_at: Instant,
}

#[derive(Debug)]
pub struct FallbackExecutor {
    breaker: Arc<CircuitBreaker>,
    config: FallbackConfig,
    sticky: DashMap<String, StickyChoice>,
}

impl FallbackExecutor {
    pub fn new(breaker: Arc<CircuitBreaker>, config: FallbackConfig) -> Arc<Self> {
        Arc::new(Self { breaker, config, sticky: DashMap::new() })
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn registry(&self) -> &Arc<HealthRegistry> {
        self.breaker.registry()
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Last-known-good resource for `group`.
    pub fn preferred(&self, group: &str) -> Option<String> {
        self.sticky.get(group).map(|choice| choice.resource_id.clone())
    }

    pub fn clear_preference(&self, group: &str) {
        self.sticky.remove(group);
    }

    /// Try `operation` against `candidates` until one succeeds.
    ///
    /// `candidates` are in priority order. Fails with `Exhausted` carrying
    /// every candidate's error in attempt order, or `Cancelled` when the
    /// context's token fires.
    pub async fn execute_with_fallback<C, T, F, Fut>(
        &self,
        ctx: &ExecutionContext,
        candidates: &[C],
        operation: F,
    ) -> Result<T, ResilienceError>
    where
        C: Candidate + Clone,
        F: Fn(C) -> Fut,
        Fut: Future<Output = Result<T, ResilienceError>>,
    {
        let group = ctx.group();
        let order =
            if ctx.uses_preference() { self.order(group, candidates) } else { self.health_order(candidates) };
        let max_attempts =
            ctx.max_attempts().or(self.config.max_attempts).unwrap_or(candidates.len()).max(1);

        let mut attempts: usize = 0;
        let mut failures: Vec<CandidateFailure> = Vec::new();
        let mut deferred: Vec<(usize, ResilienceError)> = Vec::new();
        let mut pending_backoff: Option<(u32, Option<u64>)> = None;

        for &index in &order {
            if attempts >= max_attempts {
                break;
            }
            if ctx.is_cancelled() {
                return Err(ResilienceError::Cancelled);
            }

            let candidate = &candidates[index];
            if !self.breaker.is_open(candidate.resource_id()) {
                self.wait_backoff(ctx, pending_backoff.take()).await?;
            }
            let permit = match self.breaker.try_acquire(candidate.resource_id()) {
                Ok(permit) => permit,
                Err(open) => {
                    debug!(group = %group, resource_id = %candidate.resource_id(), "Skipping open circuit");
                    deferred.push((index, open));
                    continue;
                },
            };

            attempts += 1;
            match self.attempt(ctx, permit, operation(candidate.clone())).await {
                Ok(value) => {
                    self.mark_success(ctx, candidate.resource_id(), attempts);
                    return Ok(value);
                },
                Err(e) => {
                    pending_backoff = self.note_failure(group, candidate.resource_id(), attempts, &e);
                    failures.push(CandidateFailure::new(candidate.resource_id(), e));
                },
            }
        }

        // Last resort: every admitted candidate failed, try the best open one anyway.
        if attempts < max_attempts && !deferred.is_empty() {
            let (index, _) = deferred.remove(0);
            let candidate = &candidates[index];
            if ctx.is_cancelled() {
                return Err(ResilienceError::Cancelled);
            }
            warn!(
                group = %group,
                resource_id = %candidate.resource_id(),
                "⚠️ All closed candidates failed, forcing open circuit as last resort"
            );
            self.wait_backoff(ctx, pending_backoff.take()).await?;
            let permit = self.breaker.force_acquire(candidate.resource_id());
            attempts += 1;
            match self.attempt(ctx, permit, operation(candidate.clone())).await {
                Ok(value) => {
                    self.mark_success(ctx, candidate.resource_id(), attempts);
                    return Ok(value);
                },
                Err(e) => failures.push(CandidateFailure::new(candidate.resource_id(), e)),
            }
        }

        for (index, open) in deferred {
            failures.push(CandidateFailure::new(candidates[index].resource_id(), open));
        }

        metrics::record_fallback_exhausted(group);
        warn!(group = %group, attempts, candidates = candidates.len(), "❌ All candidates failed");
        Err(ResilienceError::Exhausted { group: group.to_string(), failures })
    }

    /// Candidate indices in the order they will be tried.
    fn order<C: Candidate>(&self, group: &str, candidates: &[C]) -> Vec<usize> {
        let registry = self.registry();
        let mut order = self.health_order(candidates);

        // Clone out before any removal: holding a DashMap ref while removing deadlocks.
        let Some(sticky) = self.sticky.get(group).map(|choice| choice.clone()) else {
            return order;
        };
        let Some(sticky_index) = candidates.iter().position(|c| c.resource_id() == sticky.resource_id)
        else {
            return order;
        };

        let promoted = candidates[..sticky_index]
            .iter()
            .find(|c| registry.recovered_since(c.resource_id(), sticky.chosen_at));
        if let Some(recovered) = promoted {
            info!(
                group = %group,
                resource_id = %recovered.resource_id(),
                previous = %sticky.resource_id,
                "⬆️ Recovered resource promoted back to primary"
            );
            self.sticky.remove(group);
            return order;
        }

        if registry.is_healthy(&sticky.resource_id) {
            if let Some(pos) = order.iter().position(|&i| i == sticky_index) {
                let index = order.remove(pos);
                order.insert(0, index);
            }
        }
        order
    }

    /// Healthy candidates first, priority kept within each half.
    fn health_order<C: Candidate>(&self, candidates: &[C]) -> Vec<usize> {
        let registry = self.registry();
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by_key(|&i| !registry.is_healthy(candidates[i].resource_id()));
        order
    }

    async fn attempt<T, Fut>(
        &self,
        ctx: &ExecutionContext,
        permit: CircuitPermit<'_>,
        operation: Fut,
    ) -> Result<T, ResilienceError>
    where
        Fut: Future<Output = Result<T, ResilienceError>>,
    {
        let timeout = ctx.timeout().unwrap_or_else(|| self.config.data_call_timeout());
        let result = tokio::select! {
            biased;
            // Dropping the operation cancels it; the unresolved permit records nothing.
            () = ctx.cancellation_token().cancelled() => return Err(ResilienceError::Cancelled),
            outcome = tokio::time::timeout(timeout, operation) => match outcome {
                Ok(result) => result,
                Err(_) => Err(ResilienceError::timeout(permit.resource_id(), timeout)),
            },
        };
        permit.resolve(&result);
        result
    }

    async fn wait_backoff(
        &self,
        ctx: &ExecutionContext,
        pending: Option<(u32, Option<u64>)>,
    ) -> Result<(), ResilienceError> {
        let Some((attempt, retry_after_ms)) = pending else {
            return Ok(());
        };
        let delay = backoff::rate_limit_delay(&self.config, attempt, retry_after_ms);
        info!(
            group = %ctx.group(),
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Rate limited, backing off before next candidate"
        );
        metrics::record_backoff(ctx.group(), delay);
        backoff::sleep_cancellable(delay, ctx.cancellation_token()).await
    }

    /// Returns the backoff to apply before the next attempt, if any.
    fn note_failure(
        &self,
        group: &str,
        resource_id: &str,
        attempts: usize,
        error: &ResilienceError,
    ) -> Option<(u32, Option<u64>)> {
        debug!(
            group = %group,
            resource_id = %resource_id,
            attempt = attempts,
            error = %error,
            "Candidate failed, trying next"
        );
        let policy = self.breaker.rate_limit_policy();
        (error.is_rate_limit() && policy.backoff).then(|| {
            let attempt = u32::try_from(attempts.saturating_sub(1)).unwrap_or(u32::MAX);
            (attempt, error.retry_after_ms())
        })
    }

    fn mark_success(&self, ctx: &ExecutionContext, resource_id: &str, attempts: usize) {
        let group = ctx.group();
        let unchanged = self.sticky.get(group).is_some_and(|choice| choice.resource_id == resource_id);
        if ctx.uses_preference() && !unchanged {
            self.sticky.insert(
                group.to_string(),
                StickyChoice { resource_id: resource_id.to_string(), chosen_at: Instant::now() },
            );
        }
        if attempts > 1 {
            info!(group = %group, resource_id = %resource_id, attempts, "🔄 Fallback succeeded");
        }
    }
}
