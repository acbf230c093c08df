#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test: panics are the assertion mechanism")]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::resource::{ResourceHandle, RpcEndpoint};
use vigil_core::types::{
    CacheConfig, CacheTtls, CircuitBreakerConfig, ErrorKind, FallbackConfig, HealthConfig, RateLimitPolicy,
};
use vigil_core::{CircuitBreaker, FallbackExecutor, HealthRegistry, RpcFailover};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor(failure_threshold: u32) -> Arc<FallbackExecutor> {
    let registry = HealthRegistry::new(HealthConfig { failure_threshold, ..Default::default() });
    let breaker = CircuitBreaker::new(registry, CircuitBreakerConfig::default(), RateLimitPolicy::default());
    FallbackExecutor::new(
        breaker,
        FallbackConfig { retry_base_delay_ms: 10, retry_max_delay_ms: 50, ..Default::default() },
    )
}

fn node(id: &str, server: &MockServer) -> Arc<RpcEndpoint> {
    Arc::new(RpcEndpoint::new(id, &server.uri(), Duration::from_secs(5)).expect("valid mock url"))
}

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

#[tokio::test]
async fn test_block_number_fails_over_to_second_node() {
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .expect(1)
        .mount(&broken)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
        .respond_with(rpc_result(json!("0x1312d00")))
        .expect(1)
        .mount(&healthy)
        .await;

    let executor = executor(3);
    let rpc = RpcFailover::new(
        1,
        vec![node("rpc-a", &broken), node("rpc-b", &healthy)],
        executor.clone(),
        CacheTtls::default(),
        CacheConfig::default(),
    );

    assert_eq!(rpc.block_number().await.expect("second node answers"), 20_000_000);
    let registry = executor.registry();
    assert_eq!(registry.status("rpc-a").expect("tracked").total_failures, 1);
    assert_eq!(registry.status("rpc-b").expect("tracked").total_successes, 1);
    assert_eq!(executor.preferred("rpc:1").as_deref(), Some("rpc-b"));
}

#[tokio::test]
async fn test_rpc_rate_limit_error_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32005, "message": "daily request count exceeded, retry after 2s" }
        })))
        .mount(&server)
        .await;

    let rpc = RpcFailover::new(
        1,
        vec![node("rpc-limited", &server)],
        executor(3),
        CacheTtls::default(),
        CacheConfig::default(),
    );

    let err = rpc.balance_of("0x00000000219ab540356cbb839cbe05303d7705fa").await.expect_err("rate limited");
    assert_eq!(err.kind(), ErrorKind::Exhausted);
    let nested = &err.nested_failures()[0].error;
    assert_eq!(nested.kind(), ErrorKind::RateLimited);
    assert_eq!(nested.retry_after_ms(), Some(2_000));
}

#[tokio::test]
async fn test_chain_id_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_chainId" })))
        .respond_with(rpc_result(json!("0x89")))
        .expect(1)
        .mount(&server)
        .await;

    let rpc = RpcFailover::new(
        137,
        vec![node("polygon-a", &server)],
        executor(3),
        CacheTtls::default(),
        CacheConfig::default(),
    );

    assert_eq!(rpc.remote_chain_id().await.expect("chain id"), 137);
    assert_eq!(rpc.remote_chain_id().await.expect("cached chain id"), 137);
}

#[tokio::test]
async fn test_http_429_carries_retry_after_header() {
    let limited = MockServer::start().await;
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .mount(&limited)
        .await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!("0xde0b6b3a7640000")))
        .mount(&healthy)
        .await;

    let executor = FallbackExecutor::new(
        CircuitBreaker::new(
            HealthRegistry::new(HealthConfig::default()),
            CircuitBreakerConfig::default(),
            RateLimitPolicy::default(),
        ),
        FallbackConfig { retry_base_delay_ms: 10, retry_max_delay_ms: 2_000, ..Default::default() },
    );
    let rpc = RpcFailover::new(
        1,
        vec![node("rpc-limited", &limited), node("rpc-ok", &healthy)],
        executor,
        CacheTtls::default(),
        CacheConfig::default(),
    );

    let started = std::time::Instant::now();
    let balance = rpc.balance_of("0xabc").await.expect("second node answers");
    assert_eq!(balance, 1_000_000_000_000_000_000);
    assert!(started.elapsed() >= Duration::from_secs(1), "Retry-After was not honoured");
}

#[tokio::test]
async fn test_prober_marks_failing_node_unhealthy() {
    let healthy = MockServer::start().await;
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!("0x10")))
        .mount(&healthy)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&failing)
        .await;

    let registry = HealthRegistry::new(HealthConfig { failure_threshold: 1, ..Default::default() });
    let handles = vec![
        ResourceHandle::Rpc(node("rpc-up", &healthy)),
        ResourceHandle::Rpc(node("rpc-down", &failing)),
    ];

    assert_eq!(registry.probe_all(&handles).await, 1);
    assert!(registry.is_healthy("rpc-up"));
    assert!(!registry.is_healthy("rpc-down"));

    let report = registry.snapshot();
    assert_eq!(report.resources.len(), 2);
}
