//! Account model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Longest account number accepted on creation.
pub const MAX_ACCOUNT_NUMBER_LEN: usize = 64;

/// Ledger account. `balance` is the running sum of every entry posted to it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub account_number: String,
    pub balance: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Account {
    /// Whether the balance covers a debit of `amount`.
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Input for creating a new account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub account_number: String,
    pub balance: Decimal,
}
