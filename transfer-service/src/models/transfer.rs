//! Transfer model.

use super::{Account, LedgerEntry, entry::transfer_reference};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted transfer row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    pub description: String,
    pub created_utc: DateTime<Utc>,
}

impl TransferRecord {
    /// Reference linking the two entries this transfer produced.
    pub fn reference(&self) -> String {
        transfer_reference(self.id)
    }
}

/// Input for creating a transfer row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransfer {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    pub description: String,
}

/// A request to move `amount` between two accounts identified by number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

/// Transfer together with both account snapshots and its ledger entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    #[serde(flatten)]
    pub record: TransferRecord,
    pub reference: String,
    pub from_account: Account,
    pub to_account: Account,
    pub entries: Vec<LedgerEntry>,
}

impl Transfer {
    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn amount(&self) -> Decimal {
        self.record.amount
    }
}
