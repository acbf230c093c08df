//! # Vigil Core
//!
//! Process-local reliability layer for talking to unreliable blockchain RPC
//! nodes, gas-price sources and database replicas.
//!
//! ## Architecture
//!
//! ```text
//! vigil-core/src/
//! ├── health/           # Per-resource health registry + background prober
//! ├── circuit_breaker/  # Closed/Open breaker over registry state
//! ├── fallback/         # Ordered candidates, sticky preference, backoff
//! ├── cache/            # TTL cache with optional PostgreSQL store
//! ├── resource/         # RPC / HTTP API / database endpoints + error classification
//! ├── gas/              # Tiered gas price oracle and cost estimation
//! ├── rpc_failover.rs   # JSON-RPC reads across prioritized nodes
//! ├── pool_router.rs    # Primary/replica routing per operation class
//! ├── scheduler.rs      # Cancellable periodic tasks
//! ├── config.rs         # Environment-style configuration loading
//! ├── metrics.rs        # Prometheus metrics
//! └── logger.rs         # tracing subscriber setup
//! ```
//!
//! Shared state (registry, breaker, caches) is constructed explicitly and
//! passed by `Arc`; there are no process-wide singletons apart from the
//! metrics recorder.

#![allow(
    clippy::significant_drop_tightening,
    reason = "Mutex guards are scoped to in-memory bookkeeping only"
)]
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::float_cmp,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::assertions_on_result_states
    )
)]

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod fallback;
pub mod gas;
pub mod health;
pub mod logger;
pub mod metrics;
pub mod pool_router;
pub mod resource;
pub mod rpc_failover;
pub mod scheduler;

pub use cache::{CacheStore, PgCacheStore, TtlCache};
pub use circuit_breaker::{CircuitBreaker, CircuitPermit};
pub use fallback::{ExecutionContext, FallbackExecutor};
pub use gas::{GasPriceOracle, GasSource, NativePriceFeed};
pub use health::HealthRegistry;
pub use pool_router::PoolRouter;
pub use resource::{Candidate, ResourceHandle};
pub use rpc_failover::RpcFailover;
pub use scheduler::PeriodicTask;

pub use vigil_types as types;
