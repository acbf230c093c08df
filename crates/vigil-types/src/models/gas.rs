//! Gas price quotes and derived cost estimates.
//!
//! All fee amounts are integers in the chain's smallest fee unit (wei on EVM
//! chains). Reference-currency amounts are `f64` USD.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confirmation-speed tier of a gas quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasTier {
    Standard,
    Fast,
    Instant,
}

impl GasTier {
    pub const ALL: [GasTier; 3] = [GasTier::Standard, GasTier::Fast, GasTier::Instant];
}

impl std::fmt::Display for GasTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GasTier::Standard => write!(f, "standard"),
            GasTier::Fast => write!(f, "fast"),
            GasTier::Instant => write!(f, "instant"),
        }
    }
}

impl std::str::FromStr for GasTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "safe" | "slow" => Ok(GasTier::Standard),
            "fast" | "propose" => Ok(GasTier::Fast),
            "instant" | "rapid" => Ok(GasTier::Instant),
            other => Err(format!("unknown gas tier '{other}'")),
        }
    }
}

/// Fee parameters for one tier. Immutable once produced; superseded, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPriceQuote {
    pub tier: GasTier,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub effective_gas_price: u128,
    pub as_of: DateTime<Utc>,
}

/// Standard/fast/instant quotes for one chain, as produced by a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasQuoteSet {
    pub chain_id: u64,
    /// Resource id of the source that answered
    pub source: String,
    pub standard: GasPriceQuote,
    pub fast: GasPriceQuote,
    pub instant: GasPriceQuote,
    pub base_fee_per_gas: Option<u128>,
    pub block_number: Option<u64>,
}

impl GasQuoteSet {
    pub fn quote(&self, tier: GasTier) -> &GasPriceQuote {
        match tier {
            GasTier::Standard => &self.standard,
            GasTier::Fast => &self.fast,
            GasTier::Instant => &self.instant,
        }
    }
}

/// Estimated cost of a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub tier: GasTier,
    pub gas_limit: u64,
    pub fee_per_gas: u128,
    pub cost_wei: u128,
    pub cost_native: f64,
    pub native_price_usd: f64,
    pub cost_usd: f64,
    /// True when the price feed was unavailable and the fixed fallback was used
    pub price_is_fallback: bool,
}

/// Cost estimate for a batch of transactions.
///
/// `heuristic` is always true: the discount is a fixed factor applied to the
/// summed gas limits, not a simulation of the batched call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCostEstimate {
    pub transaction_count: usize,
    pub summed_gas_limit: u64,
    pub discount_factor: f64,
    pub cost: CostEstimate,
    pub heuristic: bool,
}

/// Net-gain analysis for a claim-style transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitabilityAnalysis {
    pub expected_value_usd: f64,
    pub estimated_cost_usd: f64,
    pub net_gain_usd: f64,
    pub profitable: bool,
    pub cost: CostEstimate,
}

impl ProfitabilityAnalysis {
    pub fn new(expected_value_usd: f64, cost: CostEstimate) -> Self {
        let net_gain_usd = expected_value_usd - cost.cost_usd;
        Self {
            expected_value_usd,
            estimated_cost_usd: cost.cost_usd,
            net_gain_usd,
            profitable: net_gain_usd > 0.0,
            cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(cost_usd: f64) -> CostEstimate {
        CostEstimate {
            tier: GasTier::Standard,
            gas_limit: 21_000,
            fee_per_gas: 1_000_000_000,
            cost_wei: 21_000_000_000_000,
            cost_native: 0.000_021,
            native_price_usd: 2000.0,
            cost_usd,
            price_is_fallback: false,
        }
    }

    #[test]
    fn test_profitability_requires_strictly_positive_gain() {
        assert!(ProfitabilityAnalysis::new(10.0, cost(2.5)).profitable);
        assert!(!ProfitabilityAnalysis::new(2.5, cost(2.5)).profitable);
        assert!(!ProfitabilityAnalysis::new(1.0, cost(2.5)).profitable);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("FAST".parse::<GasTier>(), Ok(GasTier::Fast));
        assert_eq!("safe".parse::<GasTier>(), Ok(GasTier::Standard));
        assert!("warp".parse::<GasTier>().is_err());
    }
}
