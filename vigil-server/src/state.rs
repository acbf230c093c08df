//! Application State
//!
//! Wires the health registry, breaker, fallback executor and the two
//! consumers (gas oracle, pool router) from CLI flags and environment config.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vigil_core::gas::{EtherscanGasApi, HttpPriceFeed, NodeFeeEstimate, OracleContractGas};
use vigil_core::resource::{DatabaseEndpoint, DatabaseRole, HttpApiEndpoint, RpcEndpoint};
use vigil_core::types::ResilienceConfig;
use vigil_core::{
    Candidate, CircuitBreaker, FallbackExecutor, GasPriceOracle, GasSource, HealthRegistry, PeriodicTask, PgCacheStore,
    PoolRouter, ResourceHandle, RpcFailover,
};

use crate::cli::Cli;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: ResilienceConfig,
    pub executor: Arc<FallbackExecutor>,
    pub rpc: Option<Arc<RpcFailover>>,
    pub oracle: Arc<GasPriceOracle>,
    pub router: Option<Arc<PoolRouter>>,
}

impl AppState {
    pub fn new_with_components(
        config: ResilienceConfig,
        executor: Arc<FallbackExecutor>,
        rpc: Option<Arc<RpcFailover>>,
        oracle: Arc<GasPriceOracle>,
        router: Option<Arc<PoolRouter>>,
    ) -> Self {
        Self { inner: Arc::new(AppStateInner { config, executor, rpc, oracle, router }) }
    }

    /// Build every resource named on the command line.
    pub async fn from_cli(cli: &Cli, config: ResilienceConfig) -> Result<Self> {
        let registry = HealthRegistry::new(config.health.clone());
        let breaker = CircuitBreaker::new(registry, config.circuit.clone(), config.rate_limit);
        let executor = FallbackExecutor::new(breaker, config.fallback.clone());
        let call_timeout = config.fallback.data_call_timeout();

        let rpc = build_rpc(cli, &config, &executor, call_timeout)?;
        let router = build_router(cli, &config, &executor)?;

        let mut sources: Vec<Arc<dyn GasSource>> = Vec::new();
        if let Some(url) = &cli.gas_api_url {
            let endpoint = HttpApiEndpoint::new("gas-api", url, "api", call_timeout)?
                .with_api_key(cli.gas_api_key.clone());
            sources.push(Arc::new(EtherscanGasApi::new(Arc::new(endpoint))));
        }
        if let Some(rpc) = &rpc {
            if let Some(address) = &cli.gas_oracle_address {
                sources.push(Arc::new(OracleContractGas::new("gas-oracle-contract", address, Arc::clone(rpc))));
            }
            sources.push(Arc::new(NodeFeeEstimate::new("node-fee-history", Arc::clone(rpc))));
        }
        if sources.is_empty() {
            warn!("⚠️ No gas sources configured; gas endpoints will report exhaustion");
        }

        let mut oracle = GasPriceOracle::new(
            cli.chain_id,
            sources,
            Arc::clone(&executor),
            config.gas.clone(),
            config.cache.clone(),
        );
        if let Some(url) = &cli.price_feed_url {
            let endpoint = HttpApiEndpoint::new("price-feed", url, "ping", call_timeout)?;
            oracle = oracle.with_price_feed(Arc::new(HttpPriceFeed::new(Arc::new(endpoint), &cli.native_asset_id)));
        }
        if let (true, Some(router)) = (cli.persist_cache, &router) {
            let store = PgCacheStore::new(router.primary().pool().clone());
            match store.ensure_schema().await {
                Ok(()) => oracle = oracle.with_store(Arc::new(store)),
                Err(e) => warn!("⚠️ Cache persistence disabled: {}", e),
            }
        }

        info!(
            chain_id = cli.chain_id,
            rpc_nodes = rpc.as_ref().map_or(0, |r| r.nodes().len()),
            gas_sources = oracle.source_ids().len(),
            database = router.is_some(),
            "✅ Resources configured"
        );

        Ok(Self::new_with_components(config, executor, rpc, Arc::new(oracle), router))
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<HealthRegistry> {
        self.inner.executor.registry()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.inner.executor.breaker()
    }

    pub fn executor(&self) -> &Arc<FallbackExecutor> {
        &self.inner.executor
    }

    pub fn rpc(&self) -> Option<&Arc<RpcFailover>> {
        self.inner.rpc.as_ref()
    }

    pub fn oracle(&self) -> &Arc<GasPriceOracle> {
        &self.inner.oracle
    }

    pub fn router(&self) -> Option<&Arc<PoolRouter>> {
        self.inner.router.as_ref()
    }

    /// Every probe-able resource, each once.
    pub fn handles(&self) -> Vec<ResourceHandle> {
        let mut handles: Vec<ResourceHandle> = Vec::new();
        let all = self
            .inner
            .rpc
            .iter()
            .flat_map(|r| r.handles())
            .chain(self.inner.oracle.handles())
            .chain(self.inner.router.iter().flat_map(|r| r.handles()));
        for handle in all {
            if !handles.iter().any(|h| h.resource_id() == handle.resource_id()) {
                handles.push(handle);
            }
        }
        handles
    }

    /// Prober and cache sweepers; stopped together on shutdown.
    pub fn start_background(&self, cancel: &CancellationToken) -> Vec<PeriodicTask> {
        let mut tasks = vec![self.registry().start_prober(self.handles(), cancel.child_token())];
        tasks.extend(self.inner.oracle.start_sweepers(cancel));
        tasks
    }
}

fn build_rpc(
    cli: &Cli,
    config: &ResilienceConfig,
    executor: &Arc<FallbackExecutor>,
    call_timeout: Duration,
) -> Result<Option<Arc<RpcFailover>>> {
    let urls: Vec<&str> = cli.rpc_urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).collect();
    if urls.is_empty() {
        return Ok(None);
    }

    let nodes = urls
        .iter()
        .enumerate()
        .map(|(i, url)| RpcEndpoint::new(format!("rpc-{}-{i}", cli.chain_id), url, call_timeout).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Arc::new(RpcFailover::new(
        cli.chain_id,
        nodes,
        Arc::clone(executor),
        config.ttls.clone(),
        config.cache.clone(),
    ))))
}

fn build_router(
    cli: &Cli,
    config: &ResilienceConfig,
    executor: &Arc<FallbackExecutor>,
) -> Result<Option<Arc<PoolRouter>>> {
    let Some(primary_url) = &cli.database_url else {
        return Ok(None);
    };
    let acquire_timeout = config.router.write.timeout();

    let primary = DatabaseEndpoint::connect_lazy("db-primary", DatabaseRole::Primary, primary_url, acquire_timeout)?;
    let replica = cli
        .database_replica_url
        .as_deref()
        .map(|url| DatabaseEndpoint::connect_lazy("db-replica", DatabaseRole::Replica, url, acquire_timeout))
        .transpose()?;

    Ok(Some(Arc::new(PoolRouter::new(
        Arc::new(primary),
        replica.map(Arc::new),
        Arc::clone(executor),
        config.router.clone(),
    ))))
}
