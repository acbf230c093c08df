//! Test helpers for vigil-server unit tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use vigil_core::types::{GasOracleConfig, GasPriceQuote, GasQuoteSet, GasTier, ResilienceConfig, ResilienceError};
use vigil_core::{Candidate, CircuitBreaker, FallbackExecutor, GasPriceOracle, GasSource, HealthRegistry};

use crate::state::AppState;

/// Gas source answering a fixed price (in gwei) for every tier, or always failing.
#[derive(Debug)]
pub struct FixedGasSource {
    id: String,
    gwei: Option<u128>,
}

impl FixedGasSource {
    pub fn answering(id: &str, gwei: u128) -> Arc<dyn GasSource> {
        Arc::new(Self { id: id.to_string(), gwei: Some(gwei) })
    }

    pub fn failing(id: &str) -> Arc<dyn GasSource> {
        Arc::new(Self { id: id.to_string(), gwei: None })
    }
}

impl Candidate for FixedGasSource {
    fn resource_id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl GasSource for FixedGasSource {
    async fn fetch(&self, chain_id: u64, _config: &GasOracleConfig) -> Result<GasQuoteSet, ResilienceError> {
        let Some(gwei) = self.gwei else {
            return Err(ResilienceError::upstream(&self.id, "source down"));
        };
        let wei = gwei * 1_000_000_000;
        let quote = |tier| GasPriceQuote {
            tier,
            max_fee_per_gas: wei,
            max_priority_fee_per_gas: wei,
            effective_gas_price: wei,
            as_of: Utc::now(),
        };
        Ok(GasQuoteSet {
            chain_id,
            source: self.id.clone(),
            standard: quote(GasTier::Standard),
            fast: quote(GasTier::Fast),
            instant: quote(GasTier::Instant),
            base_fee_per_gas: None,
            block_number: None,
        })
    }
}

/// Minimal `AppState` with the given gas sources and no RPC or database.
pub fn test_app_state(sources: Vec<Arc<dyn GasSource>>) -> AppState {
    let config = ResilienceConfig::default();
    let registry = HealthRegistry::new(config.health.clone());
    let breaker = CircuitBreaker::new(registry, config.circuit.clone(), config.rate_limit);
    let executor = FallbackExecutor::new(breaker, config.fallback.clone());
    let oracle = GasPriceOracle::new(1, sources, Arc::clone(&executor), config.gas.clone(), config.cache.clone());

    AppState::new_with_components(config, executor, None, Arc::new(oracle), None)
}
