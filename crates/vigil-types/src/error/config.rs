//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// A recognized key carried a value that could not be parsed
    #[error("Invalid value {value:?} for {key}: {message}")]
    InvalidValue {
        /// Environment key that was being read
        key: String,
        /// Raw value as found
        value: String,
        /// Description of the parse failure
        message: String,
    },

    /// Config validation error (parsed but out of range)
    #[error("Config validation error for {field}: {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// A required setting was not provided
    #[error("Missing required setting: {key}")]
    Missing {
        /// Name of the missing key
        key: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error from any displayable parse error.
    pub fn invalid_value(key: &str, value: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidValue { key: key.to_string(), value: value.to_string(), message: err.to_string() }
    }
}
