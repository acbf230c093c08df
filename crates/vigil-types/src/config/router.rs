use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Class of database operation; each class has its own retry/timeout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Read,
    Write,
    Analytics,
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationClass::Read => write!(f, "read"),
            OperationClass::Write => write!(f, "write"),
            OperationClass::Analytics => write!(f, "analytics"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPolicy {
    /// Extra rounds over the candidate list after the first one fails
    pub retries: u32,
    pub timeout_ms: u64,
}

impl ClassPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-class policies for the primary/replica router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolRouterConfig {
    pub read: ClassPolicy,
    pub write: ClassPolicy,
    pub analytics: ClassPolicy,
}

impl Default for PoolRouterConfig {
    fn default() -> Self {
        Self {
            // Reads are idempotent: retry more, fail fast.
            read: ClassPolicy { retries: 3, timeout_ms: 5_000 },
            // Writes: fewer retries to avoid duplicate side effects.
            write: ClassPolicy { retries: 1, timeout_ms: 15_000 },
            analytics: ClassPolicy { retries: 1, timeout_ms: 120_000 },
        }
    }
}

impl PoolRouterConfig {
    pub fn policy(&self, class: OperationClass) -> &ClassPolicy {
        match class {
            OperationClass::Read => &self.read,
            OperationClass::Write => &self.write,
            OperationClass::Analytics => &self.analytics,
        }
    }
}
