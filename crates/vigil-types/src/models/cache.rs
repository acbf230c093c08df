//! Cache statistics and data classes.

use serde::{Deserialize, Serialize};

/// Category of cached data; each class carries its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    /// Slow-changing facts such as chain id or token decimals (hours)
    Metadata,
    /// Account balances (minutes)
    Balance,
    /// Prices and gas (tens of seconds)
    Price,
}

/// Counters maintained by the TTL cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub durable_hits: u64,
    pub evictions: u64,
    pub stale_served: u64,
}

impl CacheStats {
    /// Hit ratio in percent; 0 when nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}
