use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call parameters for [`super::FallbackExecutor::execute_with_fallback`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    group: String,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    max_attempts: Option<usize>,
    sticky: bool,
}

impl ExecutionContext {
    /// `group` names the logical operation; the sticky preference is kept per group.
    pub fn new(group: impl Into<String>) -> Self {
        Self { group: group.into(), timeout: None, cancel: CancellationToken::new(), max_attempts: None, sticky: true }
    }

    /// Deadline for each candidate attempt (defaults to the data-call timeout).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Keep the given priority order: the group's last-known-good resource
    /// is neither consulted nor updated.
    pub fn without_preference(mut self) -> Self {
        self.sticky = false;
        self
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn uses_preference(&self) -> bool {
        self.sticky
    }

    pub fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
