//! Resource Health Registry
//!
//! Tracks liveness and latency of every named external endpoint:
//! - Consecutive failure/success counters per resource
//! - Unhealthy after `failure_threshold` failures, healthy again after
//!   `recovery_threshold` successes
//! - Circuit breaker bookkeeping lives in the same per-resource record
//! - Background prober feeding liveness checks through the same path as
//!   real operations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  HealthRegistry                                             │
//! │  ├── resources: DashMap<String, Mutex<ResourceState>>       │
//! │  ├── prober: PeriodicTask probing every known resource      │
//! │  └── config: HealthConfig                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Updates for one resource are serialized by its mutex and ordered by
//! attempt tickets: an outcome whose ticket is older than the last applied
//! one is discarded, so a slow probe never overwrites a newer result.

mod prober;
mod registry;
mod state;


pub use registry::{AttemptTicket, HealthRegistry};
pub(crate) use state::{HealthTransition, ResourceState};
