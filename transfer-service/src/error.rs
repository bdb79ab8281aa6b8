//! Domain errors for transfer-service.

use crate::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-checkable failure kind reported alongside every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidAmount,
    InvalidAccountNumber,
    AccountNotFound,
    SameAccount,
    InsufficientFunds,
    DuplicateAccountNumber,
    NotFound,
    Cancelled,
    Timeout,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "invalid_amount",
            Self::InvalidAccountNumber => "invalid_account_number",
            Self::AccountNotFound => "account_not_found",
            Self::SameAccount => "same_account",
            Self::InsufficientFunds => "insufficient_funds",
            Self::DuplicateAccountNumber => "duplicate_account_number",
            Self::NotFound => "not_found",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::StorageFailure => "storage_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount must be positive with at most 2 decimal places, got {0}")]
    InvalidAmount(Decimal),

    #[error("invalid account number: {0}")]
    InvalidAccountNumber(String),

    #[error("account '{0}' not found")]
    AccountNotFound(String),

    #[error("cannot transfer to the same account")]
    SameAccount,

    #[error("insufficient funds in account '{account}': balance {available}, requested {requested}")]
    InsufficientFunds {
        account: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("account number '{0}' already exists")]
    DuplicateAccountNumber(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("operation cancelled by caller")]
    Cancelled,

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::InvalidAccountNumber(_) => ErrorKind::InvalidAccountNumber,
            Self::AccountNotFound(_) => ErrorKind::AccountNotFound,
            Self::SameAccount => ErrorKind::SameAccount,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::DuplicateAccountNumber(_) => ErrorKind::DuplicateAccountNumber,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    /// Validation failures are terminal; only storage conflicts are worth a
    /// retry by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure(StoreError::Conflict(_)))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidAmount(_) | Self::InvalidAccountNumber(_) | Self::SameAccount => {
                StatusCode::BAD_REQUEST
            }
            Self::AccountNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateAccountNumber(_) => StatusCode::CONFLICT,
            Self::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::StorageFailure(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            // Backend details stay in the logs.
            Self::StorageFailure(StoreError::Backend(err)) => {
                tracing::error!(error = ?err, "Storage failure");
                "storage failure".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error,
                kind: self.kind(),
            }),
        )
            .into_response()
    }
}
