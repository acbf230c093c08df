use super::*;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vigil_types::{
    CacheConfig, CircuitBreakerConfig, ErrorKind, FallbackConfig, GasOracleConfig, GasPriceQuote, GasQuoteSet,
    GasTier, HealthConfig, RateLimitPolicy, ResilienceError,
};

use crate::circuit_breaker::CircuitBreaker;
use crate::fallback::FallbackExecutor;
use crate::health::HealthRegistry;
use crate::resource::Candidate;

const GWEI: u128 = 1_000_000_000;

#[derive(Debug)]
struct FakeSource {
    id: &'static str,
    standard: Option<u128>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn answering(id: &'static str, standard: u128) -> Arc<Self> {
        Arc::new(Self { id, standard: Some(standard), calls: AtomicUsize::new(0) })
    }

    fn failing(id: &'static str) -> Arc<Self> {
        Arc::new(Self { id, standard: None, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Candidate for FakeSource {
    fn resource_id(&self) -> &str {
        self.id
    }
}

#[async_trait]
impl GasSource for FakeSource {
    async fn fetch(&self, chain_id: u64, _config: &GasOracleConfig) -> Result<GasQuoteSet, ResilienceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let standard = self.standard.ok_or_else(|| ResilienceError::upstream(self.id, "503 Service Unavailable"))?;
        let quote = |tier, price: u128| GasPriceQuote {
            tier,
            max_fee_per_gas: price,
            max_priority_fee_per_gas: price,
            effective_gas_price: price,
            as_of: Utc::now(),
        };
        Ok(GasQuoteSet {
            chain_id,
            source: self.id.to_string(),
            standard: quote(GasTier::Standard, standard),
            fast: quote(GasTier::Fast, standard * 12 / 10),
            instant: quote(GasTier::Instant, standard * 15 / 10),
            base_fee_per_gas: None,
            block_number: None,
        })
    }
}

#[derive(Debug)]
struct FakeFeed {
    price: Option<f64>,
    calls: AtomicUsize,
}

impl Candidate for FakeFeed {
    fn resource_id(&self) -> &str {
        "price-feed"
    }
}

#[async_trait]
impl NativePriceFeed for FakeFeed {
    fn asset_id(&self) -> &str {
        "ethereum"
    }

    async fn price_usd(&self) -> Result<f64, ResilienceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.price.ok_or_else(|| ResilienceError::rate_limited("price-feed", None, "HTTP 429"))
    }
}

fn executor() -> Arc<FallbackExecutor> {
    let registry = HealthRegistry::new(HealthConfig::default());
    let breaker = CircuitBreaker::new(registry, CircuitBreakerConfig::default(), RateLimitPolicy::default());
    FallbackExecutor::new(breaker, FallbackConfig::default())
}

fn oracle(sources: Vec<Arc<dyn GasSource>>) -> GasPriceOracle {
    GasPriceOracle::new(1, sources, executor(), GasOracleConfig::default(), CacheConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_quotes_cached_within_ttl() {
    let primary = FakeSource::answering("gas-api", GWEI);
    let oracle = oracle(vec![primary.clone()]);

    let first = oracle.quotes().await.unwrap();
    assert_eq!(first.standard.effective_gas_price, 1_000_000_000);

    tokio::time::advance(Duration::from_secs(10)).await;
    let second = oracle.quotes().await.unwrap();
    assert_eq!(second, first);
    assert_eq!(primary.calls(), 1);

    tokio::time::advance(Duration::from_secs(25)).await;
    oracle.quotes().await.unwrap();
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn test_falls_back_to_next_source() {
    let api = FakeSource::failing("gas-api");
    let contract = FakeSource::answering("gas-oracle-contract", 3 * GWEI);
    let node = FakeSource::answering("node-fee-history", 5 * GWEI);
    let oracle = oracle(vec![api.clone(), contract.clone(), node.clone()]);

    let set = oracle.quotes().await.unwrap();
    assert_eq!(set.source, "gas-oracle-contract");
    assert_eq!(set.chain_id, 1);
    assert_eq!(node.calls(), 0);
    assert_eq!(oracle.quote(GasTier::Fast).await.unwrap().effective_gas_price, 3_600_000_000);
}

#[tokio::test]
async fn test_all_sources_failing_is_exhausted() {
    let oracle = oracle(vec![
        FakeSource::failing("gas-api"),
        FakeSource::failing("gas-oracle-contract"),
        FakeSource::failing("node-fee-history"),
    ]);

    let err = oracle.quotes().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Exhausted);
    let ids: Vec<&str> = err.nested_failures().iter().map(|f| f.resource_id.as_str()).collect();
    assert_eq!(ids, vec!["gas-api", "gas-oracle-contract", "node-fee-history"]);
}

#[tokio::test]
async fn test_cost_estimate_uses_feed_price() {
    let feed = Arc::new(FakeFeed { price: Some(2_000.0), calls: AtomicUsize::new(0) });
    let oracle = oracle(vec![FakeSource::answering("gas-api", GWEI)]).with_price_feed(feed.clone());

    let cost = oracle.estimate_cost(21_000, GasTier::Standard).await.unwrap();
    assert_eq!(cost.cost_wei, 21_000 * GWEI);
    assert!((cost.cost_native - 0.000_021).abs() < 1e-12);
    assert!((cost.cost_usd - 0.042).abs() < 1e-9);
    assert!(!cost.price_is_fallback);

    oracle.estimate_cost(50_000, GasTier::Fast).await.unwrap();
    assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_price_feed_uses_fallback_price() {
    let feed = Arc::new(FakeFeed { price: None, calls: AtomicUsize::new(0) });
    let oracle = oracle(vec![FakeSource::answering("gas-api", GWEI)]).with_price_feed(feed);

    let cost = oracle.estimate_cost(21_000, GasTier::Standard).await.unwrap();
    assert!(cost.price_is_fallback);
    assert_eq!(cost.native_price_usd, GasOracleConfig::default().fallback_native_price_usd);
}

#[tokio::test]
async fn test_missing_price_feed_uses_fallback_price() {
    let oracle = oracle(vec![FakeSource::answering("gas-api", GWEI)]);
    let (price, is_fallback) = oracle.native_price_usd().await;
    assert!(is_fallback);
    assert_eq!(price, 2_000.0);
}

#[tokio::test]
async fn test_claim_profitability() {
    let feed = Arc::new(FakeFeed { price: Some(2_000.0), calls: AtomicUsize::new(0) });
    let oracle = oracle(vec![FakeSource::answering("gas-api", 50 * GWEI)]).with_price_feed(feed);

    // 100k gas × 50 gwei = 0.005 ETH = $10
    let worth_it = oracle.analyze_claim(25.0, 100_000, GasTier::Standard).await.unwrap();
    assert!(worth_it.profitable);
    assert!((worth_it.net_gain_usd - 15.0).abs() < 1e-9);

    let not_worth_it = oracle.analyze_claim(8.0, 100_000, GasTier::Standard).await.unwrap();
    assert!(!not_worth_it.profitable);
}

#[tokio::test]
async fn test_batch_estimate_is_flagged_heuristic() {
    let oracle = oracle(vec![FakeSource::answering("gas-api", GWEI)]);

    let batch = oracle.estimate_batch(&[21_000, 50_000], GasTier::Standard).await.unwrap();
    assert!(batch.heuristic);
    assert_eq!(batch.transaction_count, 2);
    assert_eq!(batch.summed_gas_limit, 71_000);
    assert_eq!(batch.cost.gas_limit, 60_350);
    assert_eq!(batch.cost.cost_wei, 60_350 * GWEI);
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let source = FakeSource::answering("gas-api", GWEI);
    let oracle = oracle(vec![source.clone()]);

    oracle.quotes().await.unwrap();
    assert!(oracle.invalidate_quotes());
    oracle.quotes().await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[test]
fn test_cost_estimate_conversion() {
    let cost = cost_estimate(GasTier::Instant, 21_000, 100 * GWEI, 3_000.0, false);
    assert_eq!(cost.cost_wei, 2_100_000 * GWEI);
    assert!((cost.cost_native - 0.0021).abs() < 1e-12);
    assert!((cost.cost_usd - 6.3).abs() < 1e-9);
}
