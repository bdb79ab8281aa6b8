//! Typed accessors over the Ledger Store.
//!
//! Reads go through the store's committed view and translate absent rows into
//! domain errors. The `lock_*` / `record*` helpers operate inside a unit.

use crate::error::LedgerError;
use crate::models::{Account, LedgerEntry, NewEntry, TransferRecord};
use crate::store::{LedgerStore, LedgerUnit, StoreError};
use std::sync::Arc;

#[derive(Clone)]
pub struct AccountRepository {
    store: Arc<dyn LedgerStore>,
}

impl AccountRepository {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: i64) -> Result<Account, LedgerError> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", id)))
    }

    pub async fn list(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts().await?)
    }

    /// Lock the accounts behind two numbers, always in ascending number order
    /// so that opposing transfers cannot deadlock. Results come back in
    /// argument order.
    pub async fn lock_pair_by_number(
        unit: &mut dyn LedgerUnit,
        first: &str,
        second: &str,
    ) -> Result<(Option<Account>, Option<Account>), StoreError> {
        if first == second {
            let account = unit.get_account_by_number(first).await?;
            return Ok((account.clone(), account));
        }

        if first < second {
            let a = unit.get_account_by_number(first).await?;
            let b = unit.get_account_by_number(second).await?;
            Ok((a, b))
        } else {
            let b = unit.get_account_by_number(second).await?;
            let a = unit.get_account_by_number(first).await?;
            Ok((a, b))
        }
    }

    /// Lock one account by id, failing with `NotFound` when it does not exist.
    pub async fn lock_by_id(
        unit: &mut dyn LedgerUnit,
        id: i64,
    ) -> Result<Account, LedgerError> {
        unit.get_account_for_update(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", id)))
    }
}

#[derive(Clone)]
pub struct TransactionRepository {
    store: Arc<dyn LedgerStore>,
}

impl TransactionRepository {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Entries of one account, newest first.
    pub async fn list_for_account(&self, account_id: i64) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.store.list_entries_for_account(account_id).await?)
    }

    pub async fn list_by_reference(&self, reference: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.store.list_entries_by_reference(reference).await?)
    }

    pub async fn get_transfer(&self, id: i64) -> Result<TransferRecord, LedgerError> {
        self.store
            .get_transfer(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("transfer {}", id)))
    }

    /// Post one entry inside a unit.
    pub async fn record(
        unit: &mut dyn LedgerUnit,
        entry: NewEntry,
    ) -> Result<LedgerEntry, StoreError> {
        unit.create_entry(&entry).await
    }
}
