use super::*;
use parking_lot::Mutex;
use std::time::Duration;
use vigil_types::{CircuitBreakerConfig, CircuitState, ErrorKind, HealthConfig, RateLimitPolicy};

fn executor(failure_threshold: u32, max_failures: u32) -> Arc<FallbackExecutor> {
    let registry = HealthRegistry::new(HealthConfig { failure_threshold, ..Default::default() });
    let breaker = CircuitBreaker::new(
        registry,
        CircuitBreakerConfig { max_failures, reset_timeout_ms: 60_000 },
        RateLimitPolicy::default(),
    );
    FallbackExecutor::new(breaker, FallbackConfig::default())
}

async fn trip(executor: &FallbackExecutor, id: &str) {
    let result: Result<(), _> =
        executor.breaker().execute(id, || async { Err(ResilienceError::upstream(id, "down")) }).await;
    assert!(result.is_err());
    assert_eq!(executor.breaker().state(id), CircuitState::Open);
}

#[tokio::test]
async fn test_first_two_fail_third_returns_value() {
    let executor = executor(3, 3);
    let ctx = ExecutionContext::new("rpc:1");

    let result = executor
        .execute_with_fallback(&ctx, &["rpc-1", "rpc-2", "rpc-3"], |id| async move {
            match id {
                "rpc-3" => Ok(42),
                other => Err(ResilienceError::upstream(other, "connection refused")),
            }
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    let registry = executor.registry();
    for (id, failures, successes) in [("rpc-1", 1, 0), ("rpc-2", 1, 0), ("rpc-3", 0, 1)] {
        let status = registry.status(id).expect("tracked");
        assert_eq!(status.total_failures, failures, "{id}");
        assert_eq!(status.total_successes, successes, "{id}");
    }
    assert_eq!(executor.preferred("rpc:1").as_deref(), Some("rpc-3"));
}

#[tokio::test(start_paused = true)]
async fn test_open_candidate_is_tried_only_after_closed_ones() {
    let executor = executor(3, 1);
    trip(&executor, "A").await;
    assert!(executor.breaker().is_open("A"));

    let calls = Mutex::new(Vec::<String>::new());
    let calls_ref = &calls;
    let result = executor
        .execute_with_fallback(&ExecutionContext::new("g"), &["A", "B", "C"], move |id| async move {
            calls_ref.lock().push(id.to_string());
            match id {
                "C" => Ok("from C"),
                other => Err(ResilienceError::upstream(other, "down")),
            }
        })
        .await;

    assert_eq!(result.unwrap(), "from C");
    assert_eq!(*calls.lock(), vec!["B", "C"]);
}

#[tokio::test(start_paused = true)]
async fn test_open_candidate_is_last_resort() {
    let executor = executor(3, 1);
    trip(&executor, "A").await;

    let calls = Mutex::new(Vec::<String>::new());
    let calls_ref = &calls;
    let result: Result<u32, _> = executor
        .execute_with_fallback(&ExecutionContext::new("g"), &["A", "B", "C"], move |id| async move {
            calls_ref.lock().push(id.to_string());
            Err(ResilienceError::upstream(id, "down"))
        })
        .await;

    assert_eq!(*calls.lock(), vec!["B", "C", "A"]);
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Exhausted);
    let ids: Vec<&str> = err.nested_failures().iter().map(|f| f.resource_id.as_str()).collect();
    assert_eq!(ids, vec!["B", "C", "A"]);
    assert!(err.nested_failures().iter().all(|f| f.error.kind() == ErrorKind::Upstream));
}

#[tokio::test(start_paused = true)]
async fn test_last_resort_success_closes_breaker() {
    let executor = executor(3, 1);
    trip(&executor, "A").await;
    trip(&executor, "B").await;

    let result = executor
        .execute_with_fallback(&ExecutionContext::new("g"), &["A", "B"], |_| async { Ok(1) })
        .await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(executor.breaker().state("A"), CircuitState::Closed);
    assert_eq!(executor.breaker().state("B"), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_untried_open_candidates_reported_as_circuit_open() {
    let executor = executor(3, 1);
    trip(&executor, "A").await;
    trip(&executor, "B").await;

    let result: Result<(), _> = executor
        .execute_with_fallback(&ExecutionContext::new("g"), &["A", "B"], |id| async move {
            Err(ResilienceError::upstream(id, "still down"))
        })
        .await;

    let err = result.unwrap_err();
    let kinds: Vec<(&str, ErrorKind)> =
        err.nested_failures().iter().map(|f| (f.resource_id.as_str(), f.error.kind())).collect();
    assert_eq!(kinds, vec![("A", ErrorKind::Upstream), ("B", ErrorKind::CircuitOpen)]);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_backs_off_before_next_candidate() {
    let executor = executor(3, 3);
    let started = Instant::now();
    let b_called_at = Mutex::new(None);
    let b_ref = &b_called_at;

    let result = executor
        .execute_with_fallback(&ExecutionContext::new("gas:1"), &["A", "B"], move |id| async move {
            if id == "A" {
                return Err(ResilienceError::rate_limited("A", None, "429"));
            }
            *b_ref.lock() = Some(Instant::now());
            Ok(())
        })
        .await;

    assert!(result.is_ok());
    let waited = b_called_at.lock().expect("B called") - started;
    let config = FallbackConfig::default();
    assert!(waited >= config.backoff_delay(0), "waited {waited:?}");
    assert!(waited <= Duration::from_millis(config.retry_max_delay_ms));
    assert!(waited <= Duration::from_millis(1_100));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_hint_extends_backoff() {
    let executor = executor(3, 3);
    let started = Instant::now();
    let b_called_at = Mutex::new(None);
    let b_ref = &b_called_at;

    let _ = executor
        .execute_with_fallback(&ExecutionContext::new("g"), &["A", "B"], move |id| async move {
            if id == "A" {
                return Err(ResilienceError::rate_limited("A", Some(5_000), "slow down"));
            }
            *b_ref.lock() = Some(Instant::now());
            Ok(())
        })
        .await;

    let waited = b_called_at.lock().expect("B called") - started;
    assert!(waited >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_generic_failure_moves_on_immediately() {
    let executor = executor(3, 3);
    let started = Instant::now();

    let result = executor
        .execute_with_fallback(&ExecutionContext::new("g"), &["A", "B"], |id| async move {
            if id == "A" {
                return Err(ResilienceError::upstream("A", "500"));
            }
            Ok(Instant::now())
        })
        .await;

    assert_eq!(result.unwrap() - started, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_records_nothing() {
    let executor = executor(1, 1);
    let ctx = ExecutionContext::new("g");
    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let result: Result<(), _> = executor
        .execute_with_fallback(&ctx, &["A", "B"], |_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

    assert_eq!(result, Err(ResilienceError::Cancelled));
    let status = executor.registry().status("A").expect("tracked");
    assert_eq!(status.total_failures, 0);
    assert_eq!(status.total_successes, 0);
    assert!(executor.registry().is_healthy("A"));
    assert_eq!(executor.breaker().state("A"), CircuitState::Closed);
    assert_eq!(executor.preferred("g"), None);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_recorded_as_failure() {
    let executor = executor(3, 3);
    let ctx = ExecutionContext::new("g").with_timeout(Duration::from_millis(100));

    let result = executor
        .execute_with_fallback(&ctx, &["slow", "fast"], |id| async move {
            if id == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(id)
        })
        .await;

    assert_eq!(result.unwrap(), "fast");
    assert_eq!(executor.registry().status("slow").expect("tracked").total_failures, 1);
}

#[tokio::test]
async fn test_sticky_preference_is_tried_first() {
    let executor = executor(3, 3);
    let ctx = ExecutionContext::new("g");

    let first = executor
        .execute_with_fallback(&ctx, &["A", "B"], |id| async move {
            if id == "A" {
                Err(ResilienceError::upstream("A", "blip"))
            } else {
                Ok(id)
            }
        })
        .await;
    assert_eq!(first.unwrap(), "B");

    let calls = Mutex::new(Vec::<String>::new());
    let calls_ref = &calls;
    let second = executor
        .execute_with_fallback(&ctx, &["A", "B"], move |id| async move {
            calls_ref.lock().push(id.to_string());
            Ok(id)
        })
        .await;
    assert_eq!(second.unwrap(), "B");
    assert_eq!(*calls.lock(), vec!["B"]);
}

#[tokio::test]
async fn test_context_without_preference_keeps_priority_order() {
    let executor = executor(3, 3);
    let ctx = ExecutionContext::new("g").without_preference();

    let first = executor
        .execute_with_fallback(&ctx, &["A", "B"], |id| async move {
            if id == "A" {
                Err(ResilienceError::upstream("A", "blip"))
            } else {
                Ok(id)
            }
        })
        .await;
    assert_eq!(first.unwrap(), "B");
    assert_eq!(executor.preferred("g"), None);

    let second = executor.execute_with_fallback(&ctx, &["A", "B"], |id| async move { Ok(id) }).await;
    assert_eq!(second.unwrap(), "A");
}

#[tokio::test(start_paused = true)]
async fn test_recovered_primary_is_promoted() {
    let executor = executor(1, 3);
    let ctx = ExecutionContext::new("g");

    let first = executor
        .execute_with_fallback(&ctx, &["A", "B"], |id| async move {
            if id == "A" {
                Err(ResilienceError::upstream("A", "down"))
            } else {
                Ok(id)
            }
        })
        .await;
    assert_eq!(first.unwrap(), "B");
    assert!(!executor.registry().is_healthy("A"));

    // Still down: sticky B keeps the lead
    let order = executor.order("g", &["A", "B"]);
    assert_eq!(order, vec![1, 0]);

    tokio::time::advance(Duration::from_secs(30)).await;
    executor.registry().record_outcome("A", true, 5);
    assert!(executor.registry().is_healthy("A"));

    let second = executor.execute_with_fallback(&ctx, &["A", "B"], |id| async move { Ok(id) }).await;
    assert_eq!(second.unwrap(), "A");
    assert_eq!(executor.preferred("g").as_deref(), Some("A"));
}

#[tokio::test]
async fn test_unhealthy_candidates_are_tried_after_healthy_ones() {
    let executor = executor(1, 5);
    executor.registry().record_outcome("A", false, 1);

    let order = executor.order("g", &["A", "B", "C"]);
    assert_eq!(order, vec![1, 2, 0]);
}

#[tokio::test]
async fn test_max_attempts_caps_invocations() {
    let executor = executor(3, 3);
    let ctx = ExecutionContext::new("g").with_max_attempts(2);
    let calls = Mutex::new(0_usize);
    let calls_ref = &calls;

    let result: Result<(), _> = executor
        .execute_with_fallback(&ctx, &["A", "B", "C"], move |id| async move {
            *calls_ref.lock() += 1;
            Err(ResilienceError::upstream(id, "down"))
        })
        .await;

    assert_eq!(*calls.lock(), 2);
    assert_eq!(result.unwrap_err().nested_failures().len(), 2);
}

#[tokio::test]
async fn test_no_candidates_is_exhausted() {
    let executor = executor(3, 3);
    let candidates: [&str; 0] = [];
    let result: Result<(), _> = executor
        .execute_with_fallback(&ExecutionContext::new("empty"), &candidates, |_| async { Ok(()) })
        .await;

    match result {
        Err(ResilienceError::Exhausted { group, failures }) => {
            assert_eq!(group, "empty");
            assert!(failures.is_empty());
        },
        other => panic!("expected Exhausted, got {other:?}"),
    }
}
