//! Core domain models for the reliability layer.

mod cache;
mod gas;
mod health;

pub use cache::{CacheStats, DataClass};
pub use gas::{
    BatchCostEstimate, CostEstimate, GasPriceQuote, GasQuoteSet, GasTier, ProfitabilityAnalysis,
};
pub use health::{CircuitState, HealthSnapshot, ResourceKind, ResourceStatus, StatusReport};
