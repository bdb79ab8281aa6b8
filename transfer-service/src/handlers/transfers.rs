//! Transfer endpoints.

use crate::error::LedgerError;
use crate::models::{Transfer, TransferRequest};
use crate::startup::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use service_core::middleware::request_id;

pub async fn create_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TransferRequest>,
) -> Result<(StatusCode, Json<Transfer>), LedgerError> {
    tracing::debug!(
        request_id = request_id(&headers).unwrap_or("-"),
        "Transfer requested"
    );
    let transfer = state.engine.execute(payload).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Transfer>, LedgerError> {
    Ok(Json(state.engine.lookup(id).await?))
}
