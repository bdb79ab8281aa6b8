//! Ledger entry (transaction) model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionKind {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
        }
    }

    /// Parse the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(Self::Deposit),
            "withdrawal" => Some(Self::Withdrawal),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One signed, immutable movement against a single account.
/// Positive amounts are credits, negative amounts are debits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub reference: String,
    pub description: String,
    pub created_utc: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_credit(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

/// Input for posting a single entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
    pub account_id: i64,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub reference: String,
    pub description: String,
}

/// Correlation reference shared by both entries of a transfer.
pub fn transfer_reference(transfer_id: i64) -> String {
    format!("TRF-{}", transfer_id)
}

/// Reference of the entry recording an account's opening balance.
pub fn initial_deposit_reference(account_id: i64) -> String {
    format!("INIT-{}", account_id)
}

pub fn deposit_reference() -> String {
    format!("DEP-{}", Uuid::new_v4().simple())
}

pub fn withdrawal_reference() -> String {
    format!("WDR-{}", Uuid::new_v4().simple())
}
