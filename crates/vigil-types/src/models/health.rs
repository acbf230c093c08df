//! Health and circuit status models served to the operational dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of external endpoint whose reliability is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// JSON-RPC blockchain node
    Rpc,
    /// REST+JSON pricing or gas API
    HttpApi,
    /// Relational database connection pool
    Database,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Rpc => write!(f, "rpc"),
            ResourceKind::HttpApi => write!(f, "http_api"),
            ResourceKind::Database => write!(f, "database"),
        }
    }
}

/// Breaker state. Two states only: after the cooldown an Open breaker admits
/// a single probe without a separate half-open state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Operations pass through
    #[default]
    Closed,
    /// Operations short-circuit until the cooldown elapses
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
        }
    }
}

/// Minimal health view returned by `HealthRegistry::get_health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub resource_id: String,
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Full per-resource row of the status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub resource_id: String,
    pub kind: Option<ResourceKind>,
    pub healthy: bool,
    pub circuit: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub latency_ms: Option<u64>,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Milliseconds until an open breaker admits its next probe
    pub cooldown_remaining_ms: Option<u64>,
    pub total_successes: u64,
    pub total_failures: u64,
}

/// Snapshot of every known resource, consumed by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub healthy_count: usize,
    pub unhealthy_count: usize,
    pub resources: Vec<ResourceStatus>,
}

impl StatusReport {
    pub fn from_resources(mut resources: Vec<ResourceStatus>) -> Self {
        resources.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        let healthy_count = resources.iter().filter(|r| r.healthy).count();
        Self {
            generated_at: Utc::now(),
            healthy_count,
            unhealthy_count: resources.len() - healthy_count,
            resources,
        }
    }

    pub fn resource(&self, resource_id: &str) -> Option<&ResourceStatus> {
        self.resources.iter().find(|r| r.resource_id == resource_id)
    }
}
