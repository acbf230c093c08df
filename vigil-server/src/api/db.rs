use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use vigil_core::types::OperationClass;

use super::{error_response, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PingQuery {
    #[serde(default = "default_class")]
    pub class: OperationClass,
}

fn default_class() -> OperationClass {
    OperationClass::Read
}

#[derive(Serialize)]
pub struct PingResponse {
    pub class: OperationClass,
    pub latency_ms: u64,
}

/// `SELECT 1` routed like any query of the requested class.
pub async fn ping(
    State(state): State<AppState>,
    Query(query): Query<PingQuery>,
) -> Result<Json<PingResponse>, ApiError> {
    let Some(router) = state.router() else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "No database configured".to_string()));
    };

    let started = Instant::now();
    router
        .query(query.class, |pool| async move { sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await })
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(PingResponse { class: query.class, latency_ms: started.elapsed().as_millis() as u64 }))
}
