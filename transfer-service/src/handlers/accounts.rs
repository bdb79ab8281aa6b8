//! Account endpoints.

use crate::dtos::{CreateAccountRequest, MovementRequest};
use crate::error::LedgerError;
use crate::models::{Account, LedgerEntry};
use crate::startup::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), LedgerError> {
    let account = state
        .accounts
        .create(&payload.account_number, payload.initial_balance)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<Account>>, LedgerError> {
    Ok(Json(state.accounts.list().await?))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, LedgerError> {
    Ok(Json(state.accounts.get(id).await?))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<LedgerEntry>>, LedgerError> {
    Ok(Json(state.accounts.list_transactions(id).await?))
}

pub async fn deposit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<MovementRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), LedgerError> {
    let entry = state
        .accounts
        .deposit(id, payload.amount, payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<MovementRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), LedgerError> {
    let entry = state
        .accounts
        .withdraw(id, payload.amount, payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
