use vigil_types::ResilienceError;

use super::CircuitBreaker;
use crate::health::AttemptTicket;

/// Admission to run one attempt against a resource.
///
/// Resolve it with the attempt's result to update health and breaker
/// state. Dropping it unresolved (the caller was cancelled) records
/// nothing and frees the probe slot if this permit held it.
#[must_use = "an unresolved permit records nothing"]
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    ticket: Option<AttemptTicket>,
    probe: bool,
}

impl<'a> CircuitPermit<'a> {
    pub(super) fn new(breaker: &'a CircuitBreaker, resource_id: &str, probe: bool) -> Self {
        let ticket = breaker.registry().begin_attempt(resource_id);
        Self { breaker, ticket: Some(ticket), probe }
    }

    pub fn resource_id(&self) -> &str {
        self.ticket.as_ref().map_or("", AttemptTicket::resource_id)
    }

    /// Whether this attempt is the single probe of an open breaker.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Record the attempt's outcome.
    ///
    /// Errors that never touched the resource (`CircuitOpen`, `Cancelled`)
    /// are treated like an unresolved drop.
    pub fn resolve<T>(mut self, result: &Result<T, ResilienceError>) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        let error = result.as_ref().err();
        if error.is_some_and(|e| !e.counts_as_failure()) {
            self.ticket = Some(ticket);
            return;
        }

        self.breaker.record(ticket.resource_id(), ticket.seq(), self.probe, error, ticket.elapsed());
        self.probe = false;
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if self.probe {
                self.breaker.release_probe(ticket.resource_id());
            }
            tracing::debug!(
                resource_id = %ticket.resource_id(),
                "Attempt dropped without outcome, nothing recorded"
            );
        }
    }
}
