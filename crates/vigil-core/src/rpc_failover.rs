//! JSON-RPC reads across prioritized nodes of one chain.
//!
//! Every call goes through [`FallbackExecutor`] with the group key
//! `rpc:<chain_id>`, so the node that answered last is tried first and
//! open breakers are skipped.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use vigil_types::{CacheConfig, CacheTtls, DataClass, ResilienceError};

use crate::cache::TtlCache;
use crate::fallback::{ExecutionContext, FallbackExecutor};
use crate::resource::{ResourceHandle, RpcEndpoint};

#[derive(Debug)]
pub struct RpcFailover {
    chain_id: u64,
    group: String,
    nodes: Vec<Arc<RpcEndpoint>>,
    executor: Arc<FallbackExecutor>,
    metadata: TtlCache<u64>,
    ttls: CacheTtls,
}

impl RpcFailover {
    /// `nodes` are in priority order.
    pub fn new(
        chain_id: u64,
        nodes: Vec<Arc<RpcEndpoint>>,
        executor: Arc<FallbackExecutor>,
        ttls: CacheTtls,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            chain_id,
            group: format!("rpc:{chain_id}"),
            nodes,
            executor,
            metadata: TtlCache::new(format!("rpc-metadata:{chain_id}"), cache_config),
            ttls,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn nodes(&self) -> &[Arc<RpcEndpoint>] {
        &self.nodes
    }

    /// Probe handles for the health prober.
    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.nodes.iter().cloned().map(ResourceHandle::Rpc).collect()
    }

    /// Fresh context for this chain's fallback group.
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.group.clone())
    }

    /// Run `operation` against the nodes until one succeeds.
    pub async fn execute<T, F, Fut>(&self, ctx: &ExecutionContext, operation: F) -> Result<T, ResilienceError>
    where
        F: Fn(Arc<RpcEndpoint>) -> Fut,
        Fut: Future<Output = Result<T, ResilienceError>>,
    {
        self.executor.execute_with_fallback(ctx, &self.nodes, operation).await
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ResilienceError> {
        self.call_with(&self.context(), method, params).await
    }

    /// [`Self::call`] under a caller-supplied context (deadline, cancellation).
    pub async fn call_with(
        &self,
        ctx: &ExecutionContext,
        method: &str,
        params: Value,
    ) -> Result<Value, ResilienceError> {
        self.execute(ctx, |node| {
            let params = params.clone();
            async move { node.call(method, params).await }
        })
        .await
    }

    pub async fn block_number(&self) -> Result<u64, ResilienceError> {
        self.execute(&self.context(), |node| async move { node.block_number().await }).await
    }

    /// Native balance in wei at the latest block.
    pub async fn balance_of(&self, address: &str) -> Result<u128, ResilienceError> {
        self.execute(&self.context(), |node| async move { node.balance_of(address).await }).await
    }

    pub async fn eth_call(&self, to: &str, data: &str) -> Result<String, ResilienceError> {
        self.execute(&self.context(), |node| async move { node.eth_call(to, data).await }).await
    }

    /// Chain id reported by the nodes, cached for the metadata TTL.
    pub async fn remote_chain_id(&self) -> Result<u64, ResilienceError> {
        self.metadata
            .get_or_load("chain_id", self.ttls.ttl_for(DataClass::Metadata), || async {
                self.execute(&self.context(), |node| async move { node.chain_id().await }).await
            })
            .await
    }
}
