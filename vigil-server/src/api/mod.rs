//! API Routes
//!
//! Read-mostly endpoints over the resilience layer: resource status,
//! gas quotes and cost estimates, and database reachability.

mod db;
mod gas;
mod resilience;
mod rpc;


use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use vigil_core::types::{ErrorKind, ResilienceError};

use crate::state::AppState;

pub use resilience::get_metrics;

pub fn router() -> Router<AppState> {
    Router::new()
        // Resilience
        .route("/resilience/status", get(resilience::get_status))
        .route("/resilience/resources/:resource_id", get(resilience::get_resource))
        .route("/resilience/circuits/:resource_id/reset", post(resilience::reset_circuit))
        .route("/resilience/caches", get(resilience::get_cache_stats))
        // Gas
        .route("/gas/quotes", get(gas::get_quotes))
        .route("/gas/quotes/:tier", get(gas::get_quote))
        .route("/gas/refresh", post(gas::refresh_quotes))
        .route("/gas/estimate", get(gas::get_estimate))
        .route("/gas/estimate/batch", post(gas::estimate_batch))
        .route("/gas/claim", post(gas::analyze_claim))
        // RPC
        .route("/rpc/head", get(rpc::get_head))
        // Database
        .route("/db/ping", get(db::ping))
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

pub(crate) type ApiError = (StatusCode, String);

/// Map a resilience failure onto the closest HTTP status.
pub(crate) fn error_response(error: &ResilienceError) -> ApiError {
    let status = match error.kind() {
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::CircuitOpen | ErrorKind::Exhausted | ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Config => StatusCode::BAD_REQUEST,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}
