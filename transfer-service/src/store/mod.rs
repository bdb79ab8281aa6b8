//! Ledger Store: durable storage of accounts, transfers and ledger entries.
//!
//! [`LedgerStore`] serves committed reads and opens [`LedgerUnit`]s. A unit is
//! one storage-level transaction: rows it reads through `*_for_update` /
//! `get_account_by_number` stay locked until it commits or rolls back, and
//! dropping a unit without committing rolls it back. Engines built on top of
//! the store get their atomicity and isolation from units alone and never hold
//! in-process locks of their own.

mod memory;
mod postgres;

pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

use crate::models::{
    Account, LedgerEntry, NewAccount, NewEntry, NewTransfer, TransferRecord,
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

/// Failures raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The unit lost a serialization race or deadlock; retrying is safe.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a new atomic unit.
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError>;

    async fn get_account(&self, id: i64) -> Result<Option<Account>, StoreError>;

    /// All accounts in ascending id order.
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    async fn get_transfer(&self, id: i64) -> Result<Option<TransferRecord>, StoreError>;

    /// Entries posted to an account, newest first.
    async fn list_entries_for_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Entries sharing a correlation reference, in posting order.
    async fn list_entries_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// One storage-level transaction.
#[async_trait]
pub trait LedgerUnit: Send {
    /// Read and lock an account by its external number.
    async fn get_account_by_number(
        &mut self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Read and lock an account by its surrogate id.
    async fn get_account_for_update(&mut self, id: i64) -> Result<Option<Account>, StoreError>;

    /// Insert a new account; a taken number fails with
    /// [`StoreError::UniqueViolation`].
    async fn insert_account(&mut self, account: &NewAccount) -> Result<Account, StoreError>;

    /// Full-row write of an existing account's mutable state. Rows are only
    /// created by [`insert_account`](Self::insert_account), which assigns the
    /// id; an unknown id is a backend error. Returns the row as stored.
    async fn save_account(&mut self, account: &Account) -> Result<Account, StoreError>;

    async fn create_transfer(&mut self, transfer: &NewTransfer)
    -> Result<TransferRecord, StoreError>;

    async fn create_entry(&mut self, entry: &NewEntry) -> Result<LedgerEntry, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Run `f` inside a fresh unit: commit when it returns `Ok`, roll back when it
/// returns `Err`. If the returned future is dropped before completing (timeout,
/// cancellation, panic) the unit is dropped too, which also rolls back.
pub async fn run_in_transaction<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: LedgerStore + ?Sized,
    E: From<StoreError>,
    F: for<'u> FnOnce(&'u mut dyn LedgerUnit) -> BoxFuture<'u, Result<T, E>>,
{
    let mut unit = store.begin().await?;

    let result = f(unit.as_mut()).await;

    match result {
        Ok(value) => {
            unit.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
