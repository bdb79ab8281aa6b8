//! Common test utilities for transfer-service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::config::Config as CommonConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use transfer_service::config::{StoreBackend, TransferConfig};
use transfer_service::error::ErrorKind;
use transfer_service::models::{
    Account, LedgerEntry, NewAccount, NewEntry, NewTransfer, Transfer, TransferRecord,
    TransferRequest,
};
use transfer_service::services::{AccountService, LedgerObserver, TransferEngine};
use transfer_service::store::{
    InMemoryLedgerStore, LedgerStore, LedgerUnit, PgLedgerStore, StoreError,
};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,transfer_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn transfer(from: &str, to: &str, amount: Decimal, description: &str) -> TransferRequest {
    TransferRequest {
        from_account_number: from.to_string(),
        to_account_number: to.to_string(),
        amount,
        description: description.to_string(),
    }
}

/// Configuration for an in-process app on a random port.
pub fn test_config() -> TransferConfig {
    TransferConfig {
        common: CommonConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        service_name: "transfer-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        store: StoreBackend::Memory,
        database: None,
        transfer_timeout: Duration::from_secs(5),
    }
}

/// Observer that remembers every notification it receives.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl LedgerObserver for RecordingObserver {
    fn transfer_succeeded(&self, transfer: &Transfer) {
        self.push(format!("transfer_succeeded:{}", transfer.reference));
    }

    fn transfer_failed(&self, kind: ErrorKind) {
        self.push(format!("transfer_failed:{}", kind));
    }

    fn account_created(&self, account: &Account) {
        self.push(format!("account_created:{}", account.account_number));
    }

    fn balance_changed(&self, account: &Account) {
        self.push(format!(
            "balance_changed:{}={}",
            account.account_number, account.balance
        ));
    }
}

/// Engine, account service and observer wired over one store.
pub struct Ledger<S> {
    pub store: Arc<S>,
    pub engine: TransferEngine,
    pub accounts: AccountService,
    pub observer: Arc<RecordingObserver>,
}

impl<S: LedgerStore + 'static> Ledger<S> {
    pub fn over(store: S) -> Self {
        init_tracing();
        let store = Arc::new(store);
        let observer = Arc::new(RecordingObserver::default());
        let dyn_store: Arc<dyn LedgerStore> = store.clone();
        Self {
            engine: TransferEngine::new(dyn_store.clone(), observer.clone()),
            accounts: AccountService::new(dyn_store, observer.clone()),
            store,
            observer,
        }
    }

    pub async fn open(&self, number: &str, balance: Decimal) -> Account {
        self.accounts
            .create(number, balance)
            .await
            .expect("Failed to create test account")
    }

    pub async fn balance(&self, account: &Account) -> Decimal {
        self.accounts
            .get(account.id)
            .await
            .expect("Failed to read account")
            .balance
    }

    pub async fn entries(&self, account: &Account) -> Vec<LedgerEntry> {
        self.accounts
            .list_transactions(account.id)
            .await
            .expect("Failed to list entries")
    }
}

pub fn memory_ledger() -> Ledger<InMemoryLedgerStore> {
    Ledger::over(InMemoryLedgerStore::new())
}

/// Store wrapper whose units can fail or stall on demand.
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: InMemoryLedgerStore,
    /// Fail the n-th `create_entry` (1-based) of every unit.
    pub fail_on_entry: Option<usize>,
    /// Sleep before each account lock.
    pub lock_delay: Duration,
    /// Units opened so far.
    pub units_opened: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn failing_on_entry(n: usize) -> Self {
        Self {
            fail_on_entry: Some(n),
            ..Self::default()
        }
    }

    pub fn stalling(delay: Duration) -> Self {
        Self {
            lock_delay: delay,
            ..Self::default()
        }
    }

    /// Seed an account directly, bypassing any injected fault.
    pub async fn seed(&self, number: &str, balance: Decimal) -> Account {
        let mut unit = self.inner.begin().await.unwrap();
        let account = unit
            .insert_account(&NewAccount {
                account_number: number.to_string(),
                balance,
            })
            .await
            .unwrap();
        unit.commit().await.unwrap();
        account
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
        self.units_opened.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyUnit {
            inner,
            fail_on_entry: self.fail_on_entry,
            lock_delay: self.lock_delay,
            entries: 0,
        }))
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        self.inner.get_account(id).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.inner.list_accounts().await
    }

    async fn get_transfer(&self, id: i64) -> Result<Option<TransferRecord>, StoreError> {
        self.inner.get_transfer(id).await
    }

    async fn list_entries_for_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.list_entries_for_account(account_id).await
    }

    async fn list_entries_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.list_entries_by_reference(reference).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.health_check().await
    }
}

struct FaultyUnit {
    inner: Box<dyn LedgerUnit>,
    fail_on_entry: Option<usize>,
    lock_delay: Duration,
    entries: usize,
}

impl FaultyUnit {
    async fn stall(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LedgerUnit for FaultyUnit {
    async fn get_account_by_number(
        &mut self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        Self::stall(self.lock_delay).await;
        self.inner.get_account_by_number(account_number).await
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Option<Account>, StoreError> {
        Self::stall(self.lock_delay).await;
        self.inner.get_account_for_update(id).await
    }

    async fn insert_account(&mut self, account: &NewAccount) -> Result<Account, StoreError> {
        self.inner.insert_account(account).await
    }

    async fn save_account(&mut self, account: &Account) -> Result<Account, StoreError> {
        self.inner.save_account(account).await
    }

    async fn create_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<TransferRecord, StoreError> {
        self.inner.create_transfer(transfer).await
    }

    async fn create_entry(&mut self, entry: &NewEntry) -> Result<LedgerEntry, StoreError> {
        self.entries += 1;
        if self.fail_on_entry == Some(self.entries) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "injected failure on entry {}",
                self.entries
            )));
        }
        self.inner.create_entry(entry).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

/// Connect to `TEST_DATABASE_URL`, migrate and empty the ledger tables.
pub async fn postgres_store() -> PgLedgerStore {
    init_tracing();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run PostgreSQL tests");

    let store = PgLedgerStore::connect(&database_url, 10, 1)
        .await
        .expect("Failed to connect to test database");
    store
        .run_migrations()
        .await
        .expect("Failed to run migrations");

    sqlx::query("TRUNCATE ledger_entries, transfers, accounts RESTART IDENTITY")
        .execute(store.pool())
        .await
        .expect("Failed to clean ledger tables");

    store
}
