//! Process-local Ledger Store.
//!
//! A unit owns the store mutex for its whole lifetime, so units run one at a
//! time (serializable). Writes are staged inside the unit and only applied to
//! the shared tables on commit.

use super::{LedgerStore, LedgerUnit, StoreError};
use crate::models::{
    Account, LedgerEntry, NewAccount, NewEntry, NewTransfer, TransferRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    transfers: BTreeMap<i64, TransferRecord>,
    entries: Vec<LedgerEntry>,
    last_account_id: i64,
    last_transfer_id: i64,
    last_entry_id: i64,
}

impl Tables {
    fn account_by_number(&self, account_number: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|a| a.account_number == account_number)
    }
}

/// In-memory [`LedgerStore`], used by tests and local runs without a database.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger entries committed so far.
    pub async fn entry_count(&self) -> usize {
        self.tables.lock().await.entries.len()
    }

    /// Number of transfers committed so far.
    pub async fn transfer_count(&self) -> usize {
        self.tables.lock().await.transfers.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
        let tables = self.tables.clone().lock_owned().await;
        let staged = Staged {
            last_account_id: tables.last_account_id,
            last_transfer_id: tables.last_transfer_id,
            last_entry_id: tables.last_entry_id,
            ..Staged::default()
        };
        Ok(Box::new(MemoryUnit { tables, staged }))
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.tables.lock().await.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.tables.lock().await.accounts.values().cloned().collect())
    }

    async fn get_transfer(&self, id: i64) -> Result<Option<TransferRecord>, StoreError> {
        Ok(self.tables.lock().await.transfers.get(&id).cloned())
    }

    async fn list_entries_for_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.tables.lock().await;
        let mut entries: Vec<LedgerEntry> = tables
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            b.created_utc
                .cmp(&a.created_utc)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    async fn list_entries_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.reference == reference)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Staged {
    accounts: BTreeMap<i64, Account>,
    transfers: Vec<TransferRecord>,
    entries: Vec<LedgerEntry>,
    last_account_id: i64,
    last_transfer_id: i64,
    last_entry_id: i64,
}

struct MemoryUnit {
    tables: OwnedMutexGuard<Tables>,
    staged: Staged,
}

impl MemoryUnit {
    fn account(&self, id: i64) -> Option<&Account> {
        self.staged
            .accounts
            .get(&id)
            .or_else(|| self.tables.accounts.get(&id))
    }

    fn require_account(&self, id: i64) -> Result<&Account, StoreError> {
        self.account(id)
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("account {} does not exist", id)))
    }
}

#[async_trait]
impl LedgerUnit for MemoryUnit {
    async fn get_account_by_number(
        &mut self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        let staged = self
            .staged
            .accounts
            .values()
            .find(|a| a.account_number == account_number);
        Ok(staged
            .or_else(|| self.tables.account_by_number(account_number))
            .cloned())
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.account(id).cloned())
    }

    async fn insert_account(&mut self, account: &NewAccount) -> Result<Account, StoreError> {
        let taken = self
            .staged
            .accounts
            .values()
            .any(|a| a.account_number == account.account_number)
            || self.tables.account_by_number(&account.account_number).is_some();
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "account_number '{}'",
                account.account_number
            )));
        }

        self.staged.last_account_id += 1;
        let now = Utc::now();
        let row = Account {
            id: self.staged.last_account_id,
            account_number: account.account_number.clone(),
            balance: account.balance,
            created_utc: now,
            updated_utc: now,
        };
        self.staged.accounts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn save_account(&mut self, account: &Account) -> Result<Account, StoreError> {
        let existing = self.require_account(account.id)?;
        let row = Account {
            id: existing.id,
            account_number: existing.account_number.clone(),
            balance: account.balance,
            created_utc: existing.created_utc,
            updated_utc: Utc::now(),
        };
        self.staged.accounts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn create_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<TransferRecord, StoreError> {
        self.require_account(transfer.from_account_id)?;
        self.require_account(transfer.to_account_id)?;

        self.staged.last_transfer_id += 1;
        let row = TransferRecord {
            id: self.staged.last_transfer_id,
            from_account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
            amount: transfer.amount,
            description: transfer.description.clone(),
            created_utc: Utc::now(),
        };
        self.staged.transfers.push(row.clone());
        Ok(row)
    }

    async fn create_entry(&mut self, entry: &NewEntry) -> Result<LedgerEntry, StoreError> {
        self.require_account(entry.account_id)?;

        self.staged.last_entry_id += 1;
        let row = LedgerEntry {
            id: self.staged.last_entry_id,
            account_id: entry.account_id,
            kind: entry.kind,
            amount: entry.amount,
            reference: entry.reference.clone(),
            description: entry.description.clone(),
            created_utc: Utc::now(),
        };
        self.staged.entries.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnit { mut tables, staged } = *self;

        tables.accounts.extend(staged.accounts);
        tables
            .transfers
            .extend(staged.transfers.into_iter().map(|t| (t.id, t)));
        tables.entries.extend(staged.entries);
        tables.last_account_id = staged.last_account_id;
        tables.last_transfer_id = staged.last_transfer_id;
        tables.last_entry_id = staged.last_entry_id;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged writes are discarded with the unit.
        Ok(())
    }
}
