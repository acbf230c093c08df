//! Tiered gas price oracle.
//!
//! Sources are tried in priority order through the fallback executor:
//!
//! 1. External gas-tracker API ([`EtherscanGasApi`])
//! 2. On-chain fast-gas aggregator read ([`OracleContractGas`])
//! 3. The node's own fee history ([`NodeFeeEstimate`])
//!
//! The winning quote set is cached per chain for `GAS_QUOTE_TTL_MS`. Cost
//! estimates convert wei to USD with a separately cached native price that
//! falls back to a fixed value when the price feed is down.

mod oracle;
mod price_feed;
mod sources;

#[cfg(test)]
mod tests;

pub use oracle::{cost_estimate, GasPriceOracle};
pub use price_feed::{HttpPriceFeed, NativePriceFeed};
pub use sources::{parse_gwei, EtherscanGasApi, GasSource, NodeFeeEstimate, OracleContractGas};

/// Wei per gwei.
pub const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Wei per whole native unit (ETH).
pub const WEI_PER_NATIVE: f64 = 1e18;
