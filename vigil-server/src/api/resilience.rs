use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use vigil_core::types::{CacheStats, ResourceStatus, StatusReport};

use super::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub report: StatusReport,
    pub circuit_trips: u64,
    pub overall_healthy: bool,
    pub probe_interval_ms: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let report = state.registry().snapshot();
    let overall_healthy = report.unhealthy_count == 0;

    Json(StatusResponse {
        report,
        circuit_trips: state.breaker().total_trips(),
        overall_healthy,
        probe_interval_ms: state.config().health.check_interval_ms,
    })
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<Json<ResourceStatus>, ApiError> {
    state
        .registry()
        .status(&resource_id)
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown resource: {resource_id}")))
}

pub async fn reset_circuit(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<Json<ResourceStatus>, ApiError> {
    if state.registry().status(&resource_id).is_none() {
        return Err((StatusCode::NOT_FOUND, format!("Unknown resource: {resource_id}")));
    }
    state.breaker().reset(&resource_id);
    state
        .registry()
        .status(&resource_id)
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown resource: {resource_id}")))
}

#[derive(Serialize)]
pub struct CacheStatsResponse {
    pub gas_quotes: CacheStats,
    pub native_price: CacheStats,
}

pub async fn get_cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let oracle = state.oracle();
    Json(CacheStatsResponse { gas_quotes: oracle.quote_cache_stats(), native_price: oracle.price_cache_stats() })
}

pub async fn get_metrics(State(state): State<AppState>) -> axum::response::Response<axum::body::Body> {
    use axum::http::header;
    use axum::response::IntoResponse;

    let report = state.registry().snapshot();
    vigil_core::metrics::update_resource_gauges(report.healthy_count, report.unhealthy_count);
    vigil_core::metrics::update_uptime_gauge();
    let metrics = vigil_core::metrics::render_metrics();

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], metrics).into_response()
}
