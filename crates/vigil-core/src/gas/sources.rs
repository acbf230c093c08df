//! Gas quote sources.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Debug;
use std::sync::Arc;
use vigil_types::{GasOracleConfig, GasPriceQuote, GasQuoteSet, GasTier, ResilienceError};

use super::WEI_PER_GWEI;
use crate::resource::{classify, parse_hex_u128, parse_hex_u64, Candidate, HttpApiEndpoint, ResourceHandle};
use crate::rpc_failover::RpcFailover;

/// One provider of standard/fast/instant gas quotes.
#[async_trait]
pub trait GasSource: Candidate + Debug {
    /// Fetch a full quote set for `chain_id`.
    async fn fetch(&self, chain_id: u64, config: &GasOracleConfig) -> Result<GasQuoteSet, ResilienceError>;

    /// Network resource to probe in the background, if the source owns one.
    fn handle(&self) -> Option<ResourceHandle> {
        None
    }
}

// ============================================================================
// External gas-tracker API
// ============================================================================

#[derive(Debug, Deserialize)]
struct GasTrackerEnvelope {
    status: String,
    #[serde(default)]
    message: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GasTrackerResult {
    #[serde(default)]
    last_block: Option<String>,
    safe_gas_price: String,
    propose_gas_price: String,
    fast_gas_price: String,
    #[serde(rename = "suggestBaseFee", default)]
    suggest_base_fee: Option<String>,
}

/// Etherscan-compatible `gastracker/gasoracle` endpoint. Prices are gwei strings.
#[derive(Debug)]
pub struct EtherscanGasApi {
    endpoint: Arc<HttpApiEndpoint>,
}

impl EtherscanGasApi {
    pub fn new(endpoint: Arc<HttpApiEndpoint>) -> Self {
        Self { endpoint }
    }

    fn parse(&self, chain_id: u64, envelope: GasTrackerEnvelope) -> Result<GasQuoteSet, ResilienceError> {
        let id = self.endpoint.id();
        if envelope.status != "1" {
            let detail = envelope.result.as_str().unwrap_or_default();
            let message = format!("{}: {detail}", envelope.message);
            if classify::is_rate_limit_message(&message) {
                return Err(ResilienceError::rate_limited(id, classify::parse_retry_after(&message), message));
            }
            return Err(ResilienceError::upstream(id, message));
        }

        let result: GasTrackerResult = serde_json::from_value(envelope.result)
            .map_err(|e| ResilienceError::upstream(id, format!("Malformed gas oracle result: {e}")))?;
        let base_fee = result.suggest_base_fee.as_deref().and_then(|raw| parse_gwei(raw).ok());
        let price = |raw: &str| {
            parse_gwei(raw).map_err(|e| ResilienceError::upstream(id, format!("Invalid gas price {raw:?}: {e}")))
        };
        let now = Utc::now();

        Ok(GasQuoteSet {
            chain_id,
            source: id.to_string(),
            standard: legacy_quote(GasTier::Standard, price(&result.safe_gas_price)?, base_fee, now),
            fast: legacy_quote(GasTier::Fast, price(&result.propose_gas_price)?, base_fee, now),
            instant: legacy_quote(GasTier::Instant, price(&result.fast_gas_price)?, base_fee, now),
            base_fee_per_gas: base_fee,
            block_number: result.last_block.and_then(|b| b.parse().ok()),
        })
    }
}

impl Candidate for EtherscanGasApi {
    fn resource_id(&self) -> &str {
        self.endpoint.id()
    }
}

#[async_trait]
impl GasSource for EtherscanGasApi {
    async fn fetch(&self, chain_id: u64, _config: &GasOracleConfig) -> Result<GasQuoteSet, ResilienceError> {
        let chain = chain_id.to_string();
        let envelope: GasTrackerEnvelope = self
            .endpoint
            .get_json("api", &[("chainid", &chain), ("module", "gastracker"), ("action", "gasoracle")])
            .await?;
        self.parse(chain_id, envelope)
    }

    fn handle(&self) -> Option<ResourceHandle> {
        Some(ResourceHandle::HttpApi(Arc::clone(&self.endpoint)))
    }
}

// ============================================================================
// On-chain aggregator
// ============================================================================

/// `latestRoundData()` selector.
const LATEST_ROUND_DATA: &str = "0xfeaf968c";

/// Chainlink-style fast-gas aggregator read via `eth_call`.
///
/// The answer (wei per gas) is the standard tier; fast and instant are
/// derived with the configured multipliers.
#[derive(Debug)]
pub struct OracleContractGas {
    id: String,
    address: String,
    rpc: Arc<RpcFailover>,
}

impl OracleContractGas {
    pub fn new(id: impl Into<String>, address: impl Into<String>, rpc: Arc<RpcFailover>) -> Self {
        Self { id: id.into(), address: address.into(), rpc }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Candidate for OracleContractGas {
    fn resource_id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl GasSource for OracleContractGas {
    async fn fetch(&self, chain_id: u64, config: &GasOracleConfig) -> Result<GasQuoteSet, ResilienceError> {
        let data = self.rpc.eth_call(&self.address, LATEST_ROUND_DATA).await?;
        let answer = decode_round_answer(&self.id, &data)?;
        let now = Utc::now();
        let tier = |tier, price| legacy_quote(tier, price, None, now);

        Ok(GasQuoteSet {
            chain_id,
            source: self.id.clone(),
            standard: tier(GasTier::Standard, answer),
            fast: tier(GasTier::Fast, scale_bps(answer, config.fast_multiplier_bps)),
            instant: tier(GasTier::Instant, scale_bps(answer, config.instant_multiplier_bps)),
            base_fee_per_gas: None,
            block_number: None,
        })
    }
}

/// Extract `answer` (second 32-byte word) from `latestRoundData()` return data.
pub(crate) fn decode_round_answer(resource_id: &str, data: &str) -> Result<u128, ResilienceError> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    let word = hex
        .get(64..128)
        .ok_or_else(|| ResilienceError::upstream(resource_id, format!("Short latestRoundData return ({} bytes)", hex.len() / 2)))?;
    let (high, low) = word.split_at(32);
    if high.chars().any(|c| c != '0') {
        return Err(ResilienceError::upstream(resource_id, "Aggregator answer is negative or out of range"));
    }
    let answer = u128::from_str_radix(low, 16)
        .map_err(|e| ResilienceError::upstream(resource_id, format!("Invalid aggregator answer: {e}")))?;
    if answer == 0 {
        return Err(ResilienceError::upstream(resource_id, "Aggregator answered zero"));
    }
    Ok(answer)
}

// ============================================================================
// Node fee history
// ============================================================================

/// Blocks sampled by `eth_feeHistory`.
const FEE_HISTORY_BLOCKS: u64 = 5;

/// Priority-fee percentiles for standard / fast / instant.
const FEE_HISTORY_PERCENTILES: [f64; 3] = [25.0, 50.0, 75.0];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeeHistory {
    oldest_block: Value,
    base_fee_per_gas: Vec<Value>,
    #[serde(default)]
    reward: Vec<Vec<Value>>,
}

/// EIP-1559 estimate from the node's recent fee history.
#[derive(Debug)]
pub struct NodeFeeEstimate {
    id: String,
    rpc: Arc<RpcFailover>,
}

impl NodeFeeEstimate {
    pub fn new(id: impl Into<String>, rpc: Arc<RpcFailover>) -> Self {
        Self { id: id.into(), rpc }
    }
}

impl Candidate for NodeFeeEstimate {
    fn resource_id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl GasSource for NodeFeeEstimate {
    async fn fetch(&self, chain_id: u64, _config: &GasOracleConfig) -> Result<GasQuoteSet, ResilienceError> {
        let params = json!([format!("0x{FEE_HISTORY_BLOCKS:x}"), "latest", FEE_HISTORY_PERCENTILES]);
        let raw = self.rpc.call("eth_feeHistory", params).await?;
        let history: FeeHistory = serde_json::from_value(raw)
            .map_err(|e| ResilienceError::upstream(&self.id, format!("Malformed fee history: {e}")))?;
        quotes_from_fee_history(&self.id, chain_id, &history)
    }
}

/// `maxFee = 2 × nextBaseFee + priority`, `effective = nextBaseFee + priority`,
/// priority being the mean reward at the tier's percentile.
pub(crate) fn quotes_from_fee_history(
    resource_id: &str,
    chain_id: u64,
    history: &FeeHistory,
) -> Result<GasQuoteSet, ResilienceError> {
    let next_base = history
        .base_fee_per_gas
        .last()
        .ok_or_else(|| ResilienceError::upstream(resource_id, "Fee history has no base fees"))
        .and_then(|v| parse_hex_u128(resource_id, v))?;
    if history.reward.is_empty() {
        return Err(ResilienceError::upstream(resource_id, "Fee history has no rewards"));
    }

    let mut priorities = [0_u128; 3];
    for (slot, priority) in priorities.iter_mut().enumerate() {
        let mut sum = 0_u128;
        let mut samples = 0_u128;
        for block in &history.reward {
            if let Some(value) = block.get(slot) {
                sum = sum.saturating_add(parse_hex_u128(resource_id, value)?);
                samples += 1;
            }
        }
        *priority = if samples == 0 { 0 } else { sum / samples };
    }
    // Keep tiers monotonic even when a sparse block skews the mean
    priorities[1] = priorities[1].max(priorities[0]);
    priorities[2] = priorities[2].max(priorities[1]);

    let now = Utc::now();
    let quote = |tier, priority: u128| GasPriceQuote {
        tier,
        max_fee_per_gas: next_base.saturating_mul(2).saturating_add(priority),
        max_priority_fee_per_gas: priority,
        effective_gas_price: next_base.saturating_add(priority),
        as_of: now,
    };

    let oldest = parse_hex_u64(resource_id, &history.oldest_block)?;
    let newest = oldest
        .checked_add(history.reward.len() as u64 - 1)
        .ok_or_else(|| ResilienceError::upstream(resource_id, "Fee history block range overflows"))?;
    Ok(GasQuoteSet {
        chain_id,
        source: resource_id.to_string(),
        standard: quote(GasTier::Standard, priorities[0]),
        fast: quote(GasTier::Fast, priorities[1]),
        instant: quote(GasTier::Instant, priorities[2]),
        base_fee_per_gas: Some(next_base),
        block_number: Some(newest),
    })
}

// ============================================================================
// Helpers
// ============================================================================

/// Quote for a single all-in gas price. The tip is whatever exceeds the base fee.
fn legacy_quote(tier: GasTier, price: u128, base_fee: Option<u128>, as_of: chrono::DateTime<Utc>) -> GasPriceQuote {
    GasPriceQuote {
        tier,
        max_fee_per_gas: price,
        max_priority_fee_per_gas: base_fee.map_or(price, |base| price.saturating_sub(base)),
        effective_gas_price: price,
        as_of,
    }
}

fn scale_bps(value: u128, bps: u32) -> u128 {
    value.saturating_mul(u128::from(bps)) / 10_000
}

/// Parse a decimal gwei string (`"12"`, `"0.75"`) into wei. Digits past nine decimals are dropped.
pub fn parse_gwei(raw: &str) -> Result<u128, String> {
    let raw = raw.trim();
    let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
        return Err(format!("not a decimal number: {raw:?}"));
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|e| format!("{e}"))? };
    let mut frac: String = frac.chars().take(9).collect();
    while frac.len() < 9 {
        frac.push('0');
    }
    let frac: u128 = frac.parse().map_err(|e| format!("{e}"))?;
    Ok(whole.saturating_mul(WEI_PER_GWEI).saturating_add(frac))
}
