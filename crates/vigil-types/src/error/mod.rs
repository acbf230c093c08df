//! Typed error definitions for Vigil.
//!
//! Every external-resource call in the reliability layer resolves to a
//! [`ResilienceError`]. Callers branch on [`ResilienceError::kind`] instead of
//! inspecting error structure, and the whole hierarchy is:
//!
//! - **Serializable** for the status API via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** via the flat [`ErrorKind`] enum

mod config;
mod resilience;

pub use config::ConfigError;
pub use resilience::{CandidateFailure, ErrorKind, ResilienceError};

/// Standard Result type using ResilienceError.
pub type Result<T> = std::result::Result<T, ResilienceError>;
