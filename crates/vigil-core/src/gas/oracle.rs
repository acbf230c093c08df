use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_types::{
    BatchCostEstimate, CacheConfig, CacheStats, CostEstimate, GasOracleConfig, GasPriceQuote, GasQuoteSet,
    GasTier, ProfitabilityAnalysis, ResilienceError,
};

use super::{GasSource, NativePriceFeed, WEI_PER_NATIVE};
use crate::cache::{CacheStore, TtlCache};
use crate::fallback::{ExecutionContext, FallbackExecutor};
use crate::resource::ResourceHandle;
use crate::scheduler::PeriodicTask;

/// Gas quotes and transaction cost estimates for one chain.
#[derive(Debug)]
pub struct GasPriceOracle {
    chain_id: u64,
    sources: Vec<Arc<dyn GasSource>>,
    price_feed: Option<Arc<dyn NativePriceFeed>>,
    executor: Arc<FallbackExecutor>,
    quotes: Arc<TtlCache<GasQuoteSet>>,
    prices: Arc<TtlCache<f64>>,
    config: GasOracleConfig,
    cache_config: CacheConfig,
}

impl GasPriceOracle {
    /// `sources` are in priority order.
    pub fn new(
        chain_id: u64,
        sources: Vec<Arc<dyn GasSource>>,
        executor: Arc<FallbackExecutor>,
        config: GasOracleConfig,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            chain_id,
            sources,
            price_feed: None,
            executor,
            quotes: Arc::new(TtlCache::new(format!("gas-quotes:{chain_id}"), cache_config.clone())),
            prices: Arc::new(TtlCache::new("native-price", cache_config.clone())),
            config,
            cache_config,
        }
    }

    pub fn with_price_feed(mut self, feed: Arc<dyn NativePriceFeed>) -> Self {
        self.price_feed = Some(feed);
        self
    }

    /// Persist quote sets so a restart within the TTL skips the sources.
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        let quotes = TtlCache::new(self.quotes.name().to_string(), self.cache_config.clone());
        self.quotes = Arc::new(quotes.with_store(store));
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn config(&self) -> &GasOracleConfig {
        &self.config
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.resource_id().to_string()).collect()
    }

    /// Probe handles of every source and the price feed.
    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.sources
            .iter()
            .filter_map(|s| s.handle())
            .chain(self.price_feed.as_ref().and_then(|f| f.handle()))
            .collect()
    }

    fn group(&self) -> String {
        format!("gas:{}", self.chain_id)
    }

    /// Current quote set, served from cache within `quote_ttl`.
    pub async fn quotes(&self) -> Result<GasQuoteSet, ResilienceError> {
        let ctx = ExecutionContext::new(self.group());
        self.quotes_with(&ctx).await
    }

    pub async fn quotes_with(&self, ctx: &ExecutionContext) -> Result<GasQuoteSet, ResilienceError> {
        let chain_id = self.chain_id;
        let config = &self.config;
        self.quotes
            .get_or_load_at_block(&self.group(), config.quote_ttl(), || async {
                let set = self
                    .executor
                    .execute_with_fallback(ctx, &self.sources, |source| async move {
                        source.fetch(chain_id, config).await
                    })
                    .await?;
                info!(
                    chain_id,
                    source = %set.source,
                    standard = set.standard.effective_gas_price,
                    "⛽ Gas quotes refreshed"
                );
                let block = set.block_number;
                Ok((set, block))
            })
            .await
    }

    pub async fn quote(&self, tier: GasTier) -> Result<GasPriceQuote, ResilienceError> {
        Ok(self.quotes().await?.quote(tier).clone())
    }

    /// Drop the cached quote set; the next call hits the sources.
    pub fn invalidate_quotes(&self) -> bool {
        self.quotes.invalidate(&self.group())
    }

    /// USD price of the native asset and whether it is the fixed fallback.
    pub async fn native_price_usd(&self) -> (f64, bool) {
        let fallback = self.config.fallback_native_price_usd;
        let Some(feed) = &self.price_feed else {
            return (fallback, true);
        };

        let ctx = ExecutionContext::new(format!("price:{}", feed.asset_id()));
        let key = format!("native_price:{}", feed.asset_id());
        let loaded = self
            .prices
            .get_or_load(&key, self.config.native_price_ttl(), || async {
                self.executor
                    .execute_with_fallback(&ctx, std::slice::from_ref(feed), |feed| async move {
                        feed.price_usd().await
                    })
                    .await
            })
            .await;

        match loaded {
            Ok(price) => (price, false),
            Err(e) => {
                warn!(asset = %feed.asset_id(), fallback, error = %e, "Price feed unavailable, using fallback price");
                (fallback, true)
            },
        }
    }

    /// Cost of one transaction of `gas_limit` at `tier`.
    pub async fn estimate_cost(&self, gas_limit: u64, tier: GasTier) -> Result<CostEstimate, ResilienceError> {
        let fee_per_gas = self.quote(tier).await?.effective_gas_price;
        let (price, is_fallback) = self.native_price_usd().await;
        Ok(cost_estimate(tier, gas_limit, fee_per_gas, price, is_fallback))
    }

    /// Whether claiming `expected_value_usd` is worth its gas.
    pub async fn analyze_claim(
        &self,
        expected_value_usd: f64,
        gas_limit: u64,
        tier: GasTier,
    ) -> Result<ProfitabilityAnalysis, ResilienceError> {
        let cost = self.estimate_cost(gas_limit, tier).await?;
        let analysis = ProfitabilityAnalysis::new(expected_value_usd, cost);
        debug!(
            expected = analysis.expected_value_usd,
            cost = analysis.estimated_cost_usd,
            net = analysis.net_gain_usd,
            profitable = analysis.profitable,
            "Claim analysis"
        );
        Ok(analysis)
    }

    /// Heuristic batch estimate: summed gas limits × the configured discount factor.
    pub async fn estimate_batch(
        &self,
        gas_limits: &[u64],
        tier: GasTier,
    ) -> Result<BatchCostEstimate, ResilienceError> {
        let summed = gas_limits.iter().fold(0_u64, |acc, g| acc.saturating_add(*g));
        let factor = self.config.batch_discount_factor;
        let discounted = (summed as f64 * factor).ceil() as u64;
        let cost = self.estimate_cost(discounted, tier).await?;

        Ok(BatchCostEstimate {
            transaction_count: gas_limits.len(),
            summed_gas_limit: summed,
            discount_factor: factor,
            cost,
            heuristic: true,
        })
    }

    pub fn quote_cache_stats(&self) -> CacheStats {
        self.quotes.stats()
    }

    pub fn price_cache_stats(&self) -> CacheStats {
        self.prices.stats()
    }

    /// Sweep both caches until `cancel` fires.
    pub fn start_sweepers(&self, cancel: &CancellationToken) -> Vec<PeriodicTask> {
        vec![self.quotes.start_sweeper(cancel.child_token()), self.prices.start_sweeper(cancel.child_token())]
    }
}

/// `gas_limit × fee_per_gas`, converted to native units and USD.
pub fn cost_estimate(
    tier: GasTier,
    gas_limit: u64,
    fee_per_gas: u128,
    native_price_usd: f64,
    price_is_fallback: bool,
) -> CostEstimate {
    let cost_wei = u128::from(gas_limit).saturating_mul(fee_per_gas);
    let cost_native = cost_wei as f64 / WEI_PER_NATIVE;
    CostEstimate {
        tier,
        gas_limit,
        fee_per_gas,
        cost_wei,
        cost_native,
        native_price_usd,
        cost_usd: cost_native * native_price_usd,
        price_is_fallback,
    }
}
