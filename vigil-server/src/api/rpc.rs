use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use super::{error_response, ApiError};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HeadResponse {
    pub chain_id: u64,
    pub block_number: u64,
    pub preferred_node: Option<String>,
}

/// Latest block through the RPC failover chain.
pub async fn get_head(State(state): State<AppState>) -> Result<Json<HeadResponse>, ApiError> {
    let Some(rpc) = state.rpc() else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "No RPC nodes configured".to_string()));
    };
    let block_number = rpc.block_number().await.map_err(|e| error_response(&e))?;

    Ok(Json(HeadResponse {
        chain_id: rpc.chain_id(),
        block_number,
        preferred_node: state.executor().preferred(rpc.group()),
    }))
}
