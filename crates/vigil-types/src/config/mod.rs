//! Configuration for the reliability layer.
//!
//! Durations are stored as milliseconds so the structs map one-to-one onto
//! the recognized environment keys; accessor methods return [`Duration`].

mod cache;
mod gas;
mod router;

pub use cache::{CacheConfig, CacheTtls};
pub use gas::GasOracleConfig;
pub use router::{ClassPolicy, OperationClass, PoolRouterConfig};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration aggregating every component's settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub health: HealthConfig,
    pub circuit: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub ttls: CacheTtls,
    pub fallback: FallbackConfig,
    pub rate_limit: RateLimitPolicy,
    pub gas: GasOracleConfig,
    pub router: PoolRouterConfig,
}

/// Health registry thresholds and prober cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Background probe interval (default: 30s)
    pub check_interval_ms: u64,
    /// Deadline for a single liveness probe (default: 10s)
    pub probe_timeout_ms: u64,
    /// Consecutive failures before a resource is marked unhealthy (default: 3)
    pub failure_threshold: u32,
    /// Consecutive successes before it is marked healthy again (default: 1)
    pub recovery_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 30_000,
            probe_timeout_ms: 10_000,
            failure_threshold: 3,
            recovery_threshold: 1,
        }
    }
}

impl HealthConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit (default: 3)
    pub max_failures: u32,
    /// Minimum time spent Open before a probe is admitted (default: 60s)
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { max_failures: 3, reset_timeout_ms: 60_000 }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Fallback executor limits and backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Cap on invocations per call; `None` means one attempt per candidate
    pub max_attempts: Option<usize>,
    /// Backoff base after a rate-limit signal (default: 1s)
    pub retry_base_delay_ms: u64,
    /// Backoff ceiling (default: 30s)
    pub retry_max_delay_ms: u64,
    /// Deadline applied to each data call (default: 30s)
    pub data_call_timeout_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            data_call_timeout_ms: 30_000,
        }
    }
}

impl FallbackConfig {
    pub fn data_call_timeout(&self) -> Duration {
        Duration::from_millis(self.data_call_timeout_ms)
    }

    /// Exponential delay `base × 2^attempt`, capped at the configured maximum.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let ms = self
            .retry_base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.retry_max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// How rate-limit signals are treated. One policy for every resource path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPolicy {
    /// Wait an exponential backoff before moving to the next candidate (default: true)
    pub backoff: bool,
    /// Count rate limits toward the breaker's failure threshold (default: false)
    pub trips_circuit: bool,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self { backoff: true, trips_circuit: false }
    }
}
