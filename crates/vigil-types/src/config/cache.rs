use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::DataClass;

/// TTL cache sizing and sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry count above which the oldest 10% are trimmed (default: 10000)
    pub max_entries: usize,
    /// Expired-entry sweep interval (default: 60s)
    pub sweep_interval_ms: u64,
    /// Return an expired entry when a refresh fails (default: false)
    pub serve_stale_on_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 10_000, sweep_interval_ms: 60_000, serve_stale_on_error: false }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Per-data-class time-to-live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub metadata_ms: u64,
    pub balance_ms: u64,
    pub price_ms: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            metadata_ms: 6 * 60 * 60 * 1000, // 6 hours
            balance_ms: 5 * 60 * 1000,       // 5 minutes
            price_ms: 30_000,
        }
    }
}

impl CacheTtls {
    pub fn ttl_for(&self, class: DataClass) -> Duration {
        let ms = match class {
            DataClass::Metadata => self.metadata_ms,
            DataClass::Balance => self.balance_ms,
            DataClass::Price => self.price_ms,
        };
        Duration::from_millis(ms)
    }
}
