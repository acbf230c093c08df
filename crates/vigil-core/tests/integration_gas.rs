#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test: panics are the assertion mechanism")]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::gas::{EtherscanGasApi, GasSource, HttpPriceFeed, NativePriceFeed, NodeFeeEstimate};
use vigil_core::resource::{HttpApiEndpoint, RpcEndpoint};
use vigil_core::types::{
    CacheConfig, CacheTtls, CircuitBreakerConfig, ErrorKind, FallbackConfig, GasOracleConfig, GasTier,
    HealthConfig, RateLimitPolicy,
};
use vigil_core::{CircuitBreaker, FallbackExecutor, GasPriceOracle, HealthRegistry, RpcFailover};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor() -> Arc<FallbackExecutor> {
    let registry = HealthRegistry::new(HealthConfig::default());
    let breaker = CircuitBreaker::new(registry, CircuitBreakerConfig::default(), RateLimitPolicy::default());
    FallbackExecutor::new(
        breaker,
        FallbackConfig { retry_base_delay_ms: 10, retry_max_delay_ms: 50, ..Default::default() },
    )
}

fn gas_api(server: &MockServer) -> Arc<EtherscanGasApi> {
    let endpoint = HttpApiEndpoint::new("etherscan", &server.uri(), "api", Duration::from_secs(5))
        .expect("valid mock url")
        .with_api_key(Some("test-key".to_string()));
    Arc::new(EtherscanGasApi::new(Arc::new(endpoint)))
}

fn gas_tracker_body() -> serde_json::Value {
    json!({
        "status": "1",
        "message": "OK",
        "result": {
            "LastBlock": "21000000",
            "SafeGasPrice": "12",
            "ProposeGasPrice": "14.5",
            "FastGasPrice": "20",
            "suggestBaseFee": "11.2",
            "gasUsedRatio": "0.4,0.6,0.5"
        }
    })
}

#[tokio::test]
async fn test_gas_tracker_quotes_and_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("module", "gastracker"))
        .and(query_param("action", "gasoracle"))
        .and(query_param("chainid", "1"))
        .and(query_param("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gas_tracker_body()))
        .expect(1)
        .mount(&server)
        .await;

    let sources: Vec<Arc<dyn GasSource>> = vec![gas_api(&server)];
    let oracle = GasPriceOracle::new(1, sources, executor(), GasOracleConfig::default(), CacheConfig::default());

    let set = oracle.quotes().await.expect("quotes");
    assert_eq!(set.source, "etherscan");
    assert_eq!(set.block_number, Some(21_000_000));
    assert_eq!(set.base_fee_per_gas, Some(11_200_000_000));
    assert_eq!(set.standard.effective_gas_price, 12_000_000_000);
    assert_eq!(set.standard.max_priority_fee_per_gas, 800_000_000);
    assert_eq!(set.fast.effective_gas_price, 14_500_000_000);
    assert_eq!(set.instant.effective_gas_price, 20_000_000_000);

    let fast = oracle.quote(GasTier::Fast).await.expect("cached quote");
    assert_eq!(fast.max_fee_per_gas, 14_500_000_000);
}

#[tokio::test]
async fn test_rate_limited_api_falls_back_to_fee_history() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Max rate limit reached"
        })))
        .mount(&api)
        .await;

    let node = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_feeHistory" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "oldestBlock": "0x10",
                "baseFeePerGas": ["0x3b9aca00", "0x3b9aca00"],
                "gasUsedRatio": [0.5],
                "reward": [["0x3b9aca00", "0x77359400", "0xb2d05e00"]]
            }
        })))
        .expect(1)
        .mount(&node)
        .await;

    let executor = executor();
    let rpc_node = Arc::new(RpcEndpoint::new("rpc-a", &node.uri(), Duration::from_secs(5)).expect("valid mock url"));
    let rpc = Arc::new(RpcFailover::new(
        1,
        vec![rpc_node],
        executor.clone(),
        CacheTtls::default(),
        CacheConfig::default(),
    ));
    let sources: Vec<Arc<dyn GasSource>> =
        vec![gas_api(&api), Arc::new(NodeFeeEstimate::new("node-fee-history", rpc))];
    let oracle = GasPriceOracle::new(1, sources, executor.clone(), GasOracleConfig::default(), CacheConfig::default());

    let set = oracle.quotes().await.expect("fee history answers");
    assert_eq!(set.source, "node-fee-history");
    assert_eq!(set.block_number, Some(16));
    assert_eq!(set.standard.max_fee_per_gas, 3_000_000_000);
    assert_eq!(set.instant.effective_gas_price, 4_000_000_000);

    let api_status = executor.registry().status("etherscan").expect("tracked");
    assert_eq!(api_status.total_failures, 1);
}

#[tokio::test]
async fn test_every_source_down_lists_each_failure() {
    let api = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&api).await;
    let node = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&node).await;

    let executor = executor();
    let rpc_node = Arc::new(RpcEndpoint::new("rpc-a", &node.uri(), Duration::from_secs(5)).expect("valid mock url"));
    let rpc = Arc::new(RpcFailover::new(
        1,
        vec![rpc_node],
        executor.clone(),
        CacheTtls::default(),
        CacheConfig::default(),
    ));
    let sources: Vec<Arc<dyn GasSource>> = vec![
        gas_api(&api),
        Arc::new(vigil_core::gas::OracleContractGas::new(
            "gas-oracle-contract",
            "0x169e633a2d1e6c10dd91238ba11c4a708dfef37c",
            rpc.clone(),
        )),
        Arc::new(NodeFeeEstimate::new("node-fee-history", rpc)),
    ];
    let oracle = GasPriceOracle::new(1, sources, executor, GasOracleConfig::default(), CacheConfig::default());

    let err = oracle.quotes().await.expect_err("all sources down");
    assert_eq!(err.kind(), ErrorKind::Exhausted);
    assert_eq!(err.nested_failures().len(), 3);
    assert_eq!(err.nested_failures()[0].error.kind(), ErrorKind::Upstream);
    // On-chain sources surface the nested RPC exhaustion
    assert_eq!(err.nested_failures()[1].error.kind(), ErrorKind::Exhausted);
}

#[tokio::test]
async fn test_price_feed_reads_usd_price() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "ethereum"))
        .and(query_param("vs_currencies", "usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ethereum": { "usd": 3012.5 } })))
        .mount(&server)
        .await;

    let endpoint = HttpApiEndpoint::new("coingecko", &server.uri(), "ping", Duration::from_secs(5))
        .expect("valid mock url");
    let feed = HttpPriceFeed::new(Arc::new(endpoint), "ethereum");
    assert_eq!(feed.price_usd().await.expect("price"), 3012.5);
}

#[tokio::test]
async fn test_price_feed_missing_asset_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let endpoint = HttpApiEndpoint::new("coingecko", &server.uri(), "ping", Duration::from_secs(5))
        .expect("valid mock url");
    let feed = HttpPriceFeed::new(Arc::new(endpoint), "ethereum");
    let err = feed.price_usd().await.expect_err("no price");
    assert_eq!(err.kind(), ErrorKind::Upstream);
}
