//! Failure taxonomy for external resource access.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ConfigError;

/// Flat classification of a [`ResilienceError`], used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    RateLimited,
    CircuitOpen,
    Upstream,
    Exhausted,
    Cancelled,
    Config,
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Exhausted => "exhausted",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Storage => "storage",
        };
        f.write_str(label)
    }
}

/// Errors produced while talking to RPC nodes, pricing APIs and databases.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum ResilienceError {
    /// Operation exceeded its deadline
    #[error("{resource_id} timed out after {after_ms}ms")]
    Timeout { resource_id: String, after_ms: u64 },

    /// Explicit rate-limit signal from the provider (HTTP 429, JSON-RPC -32005, ...)
    #[error("{resource_id} rate limited{}: {message}", retry_after_ms.map(|ms| format!(" (retry after {ms}ms)")).unwrap_or_default())]
    RateLimited { resource_id: String, retry_after_ms: Option<u64>, message: String },

    /// Short-circuited by an open breaker, no I/O attempted
    #[error("Circuit open for {resource_id}, next probe in {retry_in_ms}ms")]
    CircuitOpen { resource_id: String, retry_in_ms: u64 },

    /// Any other provider failure (transport error, 5xx, malformed payload)
    #[error("{resource_id} failed{}: {message}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Upstream { resource_id: String, status: Option<i64>, message: String },

    /// Every candidate failed; carries the per-candidate errors in attempt order
    #[error("All {} candidate(s) for {group} failed: {}", failures.len(), summarize(failures))]
    Exhausted { group: String, failures: Vec<CandidateFailure> },

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Durable store failure (cache persistence)
    #[error("Storage error: {message}")]
    Storage { message: String },
}

/// One candidate's failure inside an [`ResilienceError::Exhausted`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateFailure {
    pub resource_id: String,
    pub error: ResilienceError,
}

impl CandidateFailure {
    pub fn new(resource_id: impl Into<String>, error: ResilienceError) -> Self {
        Self { resource_id: resource_id.into(), error }
    }
}

fn summarize(failures: &[CandidateFailure]) -> String {
    let parts: Vec<String> =
        failures.iter().map(|f| format!("[{}] {}", f.resource_id, f.error)).collect();
    parts.join("; ")
}

impl ResilienceError {
    /// Generic provider failure without a status code.
    pub fn upstream(resource_id: &str, message: impl Into<String>) -> Self {
        Self::Upstream { resource_id: resource_id.to_string(), status: None, message: message.into() }
    }

    /// Provider failure carrying an HTTP status or JSON-RPC error code.
    pub fn upstream_status(resource_id: &str, status: i64, message: impl Into<String>) -> Self {
        Self::Upstream {
            resource_id: resource_id.to_string(),
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn timeout(resource_id: &str, after: std::time::Duration) -> Self {
        Self::Timeout {
            resource_id: resource_id.to_string(),
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn rate_limited(resource_id: &str, retry_after_ms: Option<u64>, message: impl Into<String>) -> Self {
        Self::RateLimited { resource_id: resource_id.to_string(), retry_after_ms, message: message.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Resource the error is attributed to, if any.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Self::Timeout { resource_id, .. }
            | Self::RateLimited { resource_id, .. }
            | Self::CircuitOpen { resource_id, .. }
            | Self::Upstream { resource_id, .. } => Some(resource_id),
            Self::Exhausted { .. } | Self::Cancelled | Self::Config(_) | Self::Storage { .. } => {
                None
            },
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether this outcome should be recorded against the resource's health.
    ///
    /// Short-circuits and cancellations never touched the resource.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Self::CircuitOpen { .. } | Self::Cancelled)
    }

    /// Provider-supplied retry hint, if one was parsed.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    /// Per-candidate errors of an exhausted fallback; empty for other variants.
    pub fn nested_failures(&self) -> &[CandidateFailure] {
        match self {
            Self::Exhausted { failures, .. } => failures,
            _ => &[],
        }
    }
}
