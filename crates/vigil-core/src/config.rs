//! Environment-style configuration loading.
//!
//! Absent or empty keys keep their defaults; a present but malformed value
//! is an error naming the key.

use std::fmt::Display;
use std::str::FromStr;
use vigil_types::{ConfigError, ResilienceConfig, ResilienceError};

/// Load configuration from the process environment.
pub fn load_from_env() -> Result<ResilienceConfig, ResilienceError> {
    load_from(|key| std::env::var(key).ok())
}

/// Load configuration from an arbitrary key lookup.
pub fn load_from<F>(lookup: F) -> Result<ResilienceConfig, ResilienceError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Lookup(lookup);
    let mut config = ResilienceConfig::default();

    env.number("HEALTH_CHECK_INTERVAL_MS", &mut config.health.check_interval_ms)?;
    env.number("HEALTH_PROBE_TIMEOUT_MS", &mut config.health.probe_timeout_ms)?;
    env.number("HEALTH_FAILURE_THRESHOLD", &mut config.health.failure_threshold)?;
    env.number("HEALTH_RECOVERY_THRESHOLD", &mut config.health.recovery_threshold)?;

    env.number("CIRCUIT_MAX_FAILURES", &mut config.circuit.max_failures)?;
    env.number("CIRCUIT_RESET_TIMEOUT_MS", &mut config.circuit.reset_timeout_ms)?;

    env.number("CACHE_MAX_ENTRIES", &mut config.cache.max_entries)?;
    env.number("CACHE_SWEEP_INTERVAL_MS", &mut config.cache.sweep_interval_ms)?;
    env.flag("CACHE_SERVE_STALE_ON_ERROR", &mut config.cache.serve_stale_on_error)?;
    env.number("CACHE_TTL_METADATA_MS", &mut config.ttls.metadata_ms)?;
    env.number("CACHE_TTL_BALANCE_MS", &mut config.ttls.balance_ms)?;
    env.number("CACHE_TTL_PRICE_MS", &mut config.ttls.price_ms)?;

    env.number("GAS_QUOTE_TTL_MS", &mut config.gas.quote_ttl_ms)?;
    env.number("NATIVE_PRICE_TTL_MS", &mut config.gas.native_price_ttl_ms)?;

    if let Some(raw) = env.get("FALLBACK_MAX_RETRY_ATTEMPTS") {
        config.fallback.max_attempts = Some(parse("FALLBACK_MAX_RETRY_ATTEMPTS", &raw)?);
    }
    env.number("RETRY_BASE_DELAY_MS", &mut config.fallback.retry_base_delay_ms)?;
    env.number("RETRY_MAX_DELAY_MS", &mut config.fallback.retry_max_delay_ms)?;
    env.number("DATA_CALL_TIMEOUT_MS", &mut config.fallback.data_call_timeout_ms)?;

    env.flag("RATE_LIMIT_BACKOFF", &mut config.rate_limit.backoff)?;
    env.flag("RATE_LIMIT_TRIPS_CIRCUIT", &mut config.rate_limit.trips_circuit)?;

    validate(&config)?;
    Ok(config)
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn number<T>(&self, key: &str, target: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        if let Some(raw) = self.get(key) {
            *target = parse(key, &raw)?;
        }
        Ok(())
    }

    fn flag(&self, key: &str, target: &mut bool) -> Result<(), ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(());
        };
        *target = match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => return Err(ConfigError::invalid_value(key, &raw, "expected true/false")),
        };
        Ok(())
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(|e| ConfigError::invalid_value(key, raw, e))
}

fn validate(config: &ResilienceConfig) -> Result<(), ConfigError> {
    let positive = [
        ("HEALTH_CHECK_INTERVAL_MS", config.health.check_interval_ms),
        ("HEALTH_PROBE_TIMEOUT_MS", config.health.probe_timeout_ms),
        ("HEALTH_FAILURE_THRESHOLD", u64::from(config.health.failure_threshold)),
        ("HEALTH_RECOVERY_THRESHOLD", u64::from(config.health.recovery_threshold)),
        ("CIRCUIT_MAX_FAILURES", u64::from(config.circuit.max_failures)),
        ("CACHE_MAX_ENTRIES", config.cache.max_entries as u64),
        ("CACHE_SWEEP_INTERVAL_MS", config.cache.sweep_interval_ms),
        ("DATA_CALL_TIMEOUT_MS", config.fallback.data_call_timeout_ms),
    ];
    if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::ValidationError {
            field: (*field).to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if config.fallback.max_attempts == Some(0) {
        return Err(ConfigError::ValidationError {
            field: "FALLBACK_MAX_RETRY_ATTEMPTS".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if config.fallback.retry_base_delay_ms > config.fallback.retry_max_delay_ms {
        return Err(ConfigError::ValidationError {
            field: "RETRY_BASE_DELAY_MS".to_string(),
            message: format!("exceeds RETRY_MAX_DELAY_MS ({})", config.fallback.retry_max_delay_ms),
        });
    }
    Ok(())
}
