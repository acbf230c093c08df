use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tiered gas price oracle settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasOracleConfig {
    /// Quote set TTL per chain (default: 30s)
    pub quote_ttl_ms: u64,
    /// Native asset price TTL (default: 5 minutes)
    pub native_price_ttl_ms: u64,
    /// USD price used when the price feed is unavailable
    pub fallback_native_price_usd: f64,
    /// Factor applied to summed gas limits for batch estimates (default: 0.85)
    pub batch_discount_factor: f64,
    /// Fast tier multiplier over standard, in basis points (default: 12000 = 1.2×)
    pub fast_multiplier_bps: u32,
    /// Instant tier multiplier over standard, in basis points (default: 15000 = 1.5×)
    pub instant_multiplier_bps: u32,
}

impl Default for GasOracleConfig {
    fn default() -> Self {
        Self {
            quote_ttl_ms: 30_000,
            native_price_ttl_ms: 5 * 60 * 1000,
            fallback_native_price_usd: 2000.0,
            batch_discount_factor: 0.85,
            fast_multiplier_bps: 12_000,
            instant_multiplier_bps: 15_000,
        }
    }
}

impl GasOracleConfig {
    pub fn quote_ttl(&self) -> Duration {
        Duration::from_millis(self.quote_ttl_ms)
    }

    pub fn native_price_ttl(&self) -> Duration {
        Duration::from_millis(self.native_price_ttl_ms)
    }
}
