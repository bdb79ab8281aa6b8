//! Domain models for transfer-service.

mod account;
pub mod entry;
pub mod money;
mod transfer;

pub use account::{Account, MAX_ACCOUNT_NUMBER_LEN, NewAccount};
pub use entry::{LedgerEntry, NewEntry, TransactionKind};
pub use transfer::{NewTransfer, Transfer, TransferRecord, TransferRequest};
