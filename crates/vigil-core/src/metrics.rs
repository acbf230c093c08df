//! Prometheus metrics for reliability-layer observability.
//!
//! Exposes metrics compatible with Prometheus/OpenMetrics format:
//! - `vigil_attempts_total{resource,outcome}` - Counter of attempts against resources
//! - `vigil_attempt_duration_seconds{resource}` - Histogram of attempt latency
//! - `vigil_circuit_trips_total{resource}` - Counter of breaker open transitions
//! - `vigil_health_transitions_total{resource,to}` - Counter of health flips
//! - `vigil_fallback_exhausted_total{group}` - Counter of all-candidates-failed calls
//! - `vigil_backoff_milliseconds_total{group}` - Counter of time spent in rate-limit backoff
//! - `vigil_cache_events_total{cache,event}` - Counter of cache hits/misses/loads/evictions
//! - `vigil_resources_healthy` / `vigil_resources_unhealthy` - Gauges from the last snapshot
//! - `vigil_uptime_seconds` - Gauge of process uptime

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

static METRICS_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Buckets for upstream latency: healthy RPC/DB calls land in tens of
/// milliseconds, degraded ones near the 10s/30s timeouts.
const UPSTREAM_LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Cache event label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Hit,
    Miss,
    Load,
    DurableHit,
    Eviction,
    StaleServed,
}

impl CacheEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheEvent::Hit => "hit",
            CacheEvent::Miss => "miss",
            CacheEvent::Load => "load",
            CacheEvent::DurableHit => "durable_hit",
            CacheEvent::Eviction => "eviction",
            CacheEvent::StaleServed => "stale_served",
        }
    }
}

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init_metrics() -> PrometheusHandle {
    let _ = METRICS_START_TIME.get_or_init(Instant::now);

    let handle = PROMETHEUS_HANDLE.get_or_init(|| {
        let builder = PrometheusBuilder::new()
            .set_buckets(UPSTREAM_LATENCY_BUCKETS)
            .expect("Failed to set histogram buckets");
        let handle = builder.install_recorder().expect("Failed to install Prometheus metrics recorder");

        describe_counter!("vigil_attempts_total", "Attempts against external resources by outcome");
        describe_histogram!("vigil_attempt_duration_seconds", "Attempt latency in seconds");
        describe_counter!("vigil_circuit_trips_total", "Circuit breaker open transitions");
        describe_counter!("vigil_health_transitions_total", "Resource health flag transitions");
        describe_counter!(
            "vigil_fallback_exhausted_total",
            "Fallback calls where every candidate failed"
        );
        describe_counter!("vigil_backoff_milliseconds_total", "Time spent waiting in rate-limit backoff");
        describe_counter!("vigil_cache_events_total", "TTL cache events by kind");
        describe_gauge!("vigil_resources_healthy", "Resources currently marked healthy");
        describe_gauge!("vigil_resources_unhealthy", "Resources currently marked unhealthy");
        describe_gauge!("vigil_uptime_seconds", "Process uptime in seconds");

        handle
    });

    handle.clone()
}

pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

pub fn record_attempt(resource_id: &str, success: bool, latency: Duration) {
    let labels = [("resource", resource_id.to_string()), ("outcome", outcome_label(success).to_string())];
    counter!("vigil_attempts_total", &labels).increment(1);
    histogram!("vigil_attempt_duration_seconds", "resource" => resource_id.to_string())
        .record(latency.as_secs_f64());
}

pub fn record_circuit_trip(resource_id: &str) {
    counter!("vigil_circuit_trips_total", "resource" => resource_id.to_string()).increment(1);
}

pub fn record_health_transition(resource_id: &str, healthy: bool) {
    let to = if healthy { "healthy" } else { "unhealthy" };
    let labels = [("resource", resource_id.to_string()), ("to", to.to_string())];
    counter!("vigil_health_transitions_total", &labels).increment(1);
}

pub fn record_fallback_exhausted(group: &str) {
    counter!("vigil_fallback_exhausted_total", "group" => group.to_string()).increment(1);
}

pub fn record_backoff(group: &str, delay: Duration) {
    counter!("vigil_backoff_milliseconds_total", "group" => group.to_string())
        .increment(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
}

pub fn record_cache_event(cache: &str, event: CacheEvent) {
    record_cache_events(cache, event, 1);
}

pub fn record_cache_events(cache: &str, event: CacheEvent, count: u64) {
    if count == 0 {
        return;
    }
    let labels = [("cache", cache.to_string()), ("event", event.as_str().to_string())];
    counter!("vigil_cache_events_total", &labels).increment(count);
}

pub fn update_resource_gauges(healthy: usize, unhealthy: usize) {
    gauge!("vigil_resources_healthy").set(healthy as f64);
    gauge!("vigil_resources_unhealthy").set(unhealthy as f64);
}

pub fn update_uptime_gauge() {
    if let Some(start) = METRICS_START_TIME.get() {
        gauge!("vigil_uptime_seconds").set(start.elapsed().as_secs_f64());
    }
}

/// Render all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    update_uptime_gauge();

    if let Some(handle) = get_prometheus_handle() {
        handle.render()
    } else {
        String::from("# Metrics not initialized\n")
    }
}

pub fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
