//! Native asset → USD price feeds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use vigil_types::ResilienceError;

use crate::resource::{Candidate, HttpApiEndpoint, ResourceHandle};

#[async_trait]
pub trait NativePriceFeed: Candidate + Debug {
    /// Asset identifier understood by the feed (e.g. `ethereum`).
    fn asset_id(&self) -> &str;

    async fn price_usd(&self) -> Result<f64, ResilienceError>;

    fn handle(&self) -> Option<ResourceHandle> {
        None
    }
}

/// CoinGecko-compatible `simple/price` endpoint.
#[derive(Debug)]
pub struct HttpPriceFeed {
    endpoint: Arc<HttpApiEndpoint>,
    asset_id: String,
}

impl HttpPriceFeed {
    pub fn new(endpoint: Arc<HttpApiEndpoint>, asset_id: impl Into<String>) -> Self {
        Self { endpoint, asset_id: asset_id.into() }
    }
}

impl Candidate for HttpPriceFeed {
    fn resource_id(&self) -> &str {
        self.endpoint.id()
    }
}

#[async_trait]
impl NativePriceFeed for HttpPriceFeed {
    fn asset_id(&self) -> &str {
        &self.asset_id
    }

    async fn price_usd(&self) -> Result<f64, ResilienceError> {
        let prices: HashMap<String, HashMap<String, f64>> = self
            .endpoint
            .get_json("simple/price", &[("ids", self.asset_id.as_str()), ("vs_currencies", "usd")])
            .await?;

        let price = prices
            .get(&self.asset_id)
            .and_then(|quotes| quotes.get("usd"))
            .copied()
            .ok_or_else(|| {
                ResilienceError::upstream(self.endpoint.id(), format!("No USD price for {}", self.asset_id))
            })?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ResilienceError::upstream(self.endpoint.id(), format!("Implausible price {price}")));
        }
        Ok(price)
    }

    fn handle(&self) -> Option<ResourceHandle> {
        Some(ResourceHandle::HttpApi(Arc::clone(&self.endpoint)))
    }
}
