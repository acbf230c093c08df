//! # Vigil Types
//!
//! Core types, models, and error definitions for the Vigil reliability layer.
//!
//! - **`error`** - Error taxonomy shared by every resource path
//! - **`config`** - Tunables for health tracking, breakers, caching and fallback
//! - **`models`** - Health snapshots, gas quotes and cost estimates
//!
//! ## Architecture Role
//!
//! `vigil-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!           vigil-types (this crate)
//!                   │
//!                   ▼
//!              vigil-core
//!                   │
//!                   ▼
//!             vigil-server
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for the status API
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod config;
pub mod error;
pub mod models;

pub use config::{
    CacheConfig, CacheTtls, CircuitBreakerConfig, ClassPolicy, FallbackConfig, GasOracleConfig,
    HealthConfig, OperationClass, PoolRouterConfig, RateLimitPolicy, ResilienceConfig,
};
pub use error::{CandidateFailure, ConfigError, ErrorKind, ResilienceError, Result};
pub use models::{
    BatchCostEstimate, CacheStats, CircuitState, CostEstimate, DataClass, GasPriceQuote,
    GasQuoteSet, GasTier, HealthSnapshot, ProfitabilityAnalysis, ResourceKind, ResourceStatus,
    StatusReport,
};
