use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use vigil_core::types::{
    BatchCostEstimate, CostEstimate, GasPriceQuote, GasQuoteSet, GasTier, ProfitabilityAnalysis,
};

use super::{error_response, ApiError};
use crate::state::AppState;

fn default_tier() -> GasTier {
    GasTier::Standard
}

pub async fn get_quotes(State(state): State<AppState>) -> Result<Json<GasQuoteSet>, ApiError> {
    state.oracle().quotes().await.map(Json).map_err(|e| error_response(&e))
}

pub async fn get_quote(
    State(state): State<AppState>,
    Path(tier): Path<String>,
) -> Result<Json<GasPriceQuote>, ApiError> {
    let tier: GasTier = tier.parse().map_err(|e: String| (StatusCode::BAD_REQUEST, e))?;
    state.oracle().quote(tier).await.map(Json).map_err(|e| error_response(&e))
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub invalidated: bool,
    pub quotes: GasQuoteSet,
}

pub async fn refresh_quotes(State(state): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    let oracle = state.oracle();
    let invalidated = oracle.invalidate_quotes();
    let quotes = oracle.quotes().await.map_err(|e| error_response(&e))?;
    Ok(Json(RefreshResponse { invalidated, quotes }))
}

#[derive(Deserialize)]
pub struct EstimateQuery {
    pub gas_limit: u64,
    #[serde(default = "default_tier")]
    pub tier: GasTier,
}

pub async fn get_estimate(
    State(state): State<AppState>,
    Query(query): Query<EstimateQuery>,
) -> Result<Json<CostEstimate>, ApiError> {
    state.oracle().estimate_cost(query.gas_limit, query.tier).await.map(Json).map_err(|e| error_response(&e))
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub gas_limits: Vec<u64>,
    #[serde(default = "default_tier")]
    pub tier: GasTier,
}

pub async fn estimate_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchCostEstimate>, ApiError> {
    if request.gas_limits.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "gas_limits must not be empty".to_string()));
    }
    state
        .oracle()
        .estimate_batch(&request.gas_limits, request.tier)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[derive(Deserialize)]
pub struct ClaimRequest {
    pub expected_value_usd: f64,
    pub gas_limit: u64,
    #[serde(default = "default_tier")]
    pub tier: GasTier,
}

pub async fn analyze_claim(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<ProfitabilityAnalysis>, ApiError> {
    state
        .oracle()
        .analyze_claim(request.expected_value_usd, request.gas_limit, request.tier)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}
