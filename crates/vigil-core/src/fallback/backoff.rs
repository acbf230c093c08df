//! Rate-limit backoff between candidates.

use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vigil_types::{FallbackConfig, ResilienceError};

/// Delay after the `attempt`-th (0-based) failed attempt was rate limited.
///
/// `base × 2^attempt` plus up to 10% jitter, raised to the provider's
/// retry hint, never above `retry_max_delay_ms`.
pub(crate) fn rate_limit_delay(config: &FallbackConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    let exponential_ms = u64::try_from(config.backoff_delay(attempt).as_millis()).unwrap_or(u64::MAX);
    let jitter_ms = rand::thread_rng().gen_range(0..=exponential_ms / 10);
    let ms = exponential_ms
        .saturating_add(jitter_ms)
        .max(retry_after_ms.unwrap_or(0))
        .min(config.retry_max_delay_ms);
    Duration::from_millis(ms)
}

/// Sleep for `delay` unless `cancel` fires first.
pub(crate) async fn sleep_cancellable(delay: Duration, cancel: &CancellationToken) -> Result<(), ResilienceError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ResilienceError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
