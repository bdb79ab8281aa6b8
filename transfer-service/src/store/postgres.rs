//! PostgreSQL Ledger Store.

use super::{LedgerStore, LedgerUnit, StoreError};
use crate::models::{
    Account, LedgerEntry, NewAccount, NewEntry, NewTransfer, TransactionKind, TransferRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};

const ACCOUNT_COLUMNS: &str = "id, account_number, balance, created_utc, updated_utc";
const TRANSFER_COLUMNS: &str =
    "id, from_account_id, to_account_id, amount, description, created_utc";
const ENTRY_COLUMNS: &str = "id, account_id, kind, amount, reference, description, created_utc";

/// Raw `ledger_entries` row; `kind` is stored as text.
#[derive(Debug, FromRow)]
struct EntryRow {
    id: i64,
    account_id: i64,
    kind: String,
    amount: Decimal,
    reference: String,
    description: String,
    created_utc: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let kind = TransactionKind::parse(&row.kind).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!(
                "entry {} has unknown kind '{}'",
                row.id,
                row.kind
            ))
        })?;
        Ok(LedgerEntry {
            id: row.id,
            account_id: row.account_id,
            kind,
            amount: row.amount,
            reference: row.reference,
            description: row.description,
            created_utc: row.created_utc,
        })
    }
}

fn into_entries(rows: Vec<EntryRow>) -> Result<Vec<LedgerEntry>, StoreError> {
    rows.into_iter().map(LedgerEntry::try_from).collect()
}

/// Classify a sqlx error. Serialization failures (40001) and deadlocks
/// (40P01) are conflicts the caller may retry.
fn store_error(context: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(db_err.message().to_string());
        }
        if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
            return StoreError::Conflict(format!("{}: {}", context, db_err.message()));
        }
    }
    StoreError::Backend(anyhow::anyhow!("{}: {}", context, err))
}

/// Connection pool backed [`LedgerStore`].
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "transfer-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to begin transaction", e))?;
        Ok(Box::new(PgLedgerUnit { tx }))
    }

    #[instrument(skip(self))]
    async fn get_account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to get account", e))
    }

    #[instrument(skip(self))]
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to list accounts", e))
    }

    #[instrument(skip(self))]
    async fn get_transfer(&self, id: i64) -> Result<Option<TransferRecord>, StoreError> {
        sqlx::query_as::<_, TransferRecord>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to get transfer", e))
    }

    #[instrument(skip(self))]
    async fn list_entries_for_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY created_utc DESC, id DESC
            "#
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to list entries", e))?;

        into_entries(rows)
    }

    #[instrument(skip(self))]
    async fn list_entries_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE reference = $1 ORDER BY id"
        ))
        .bind(reference)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to list entries by reference", e))?;

        into_entries(rows)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Health check failed", e))?;
        Ok(())
    }
}

/// A unit backed by a PostgreSQL transaction. Row reads take `FOR UPDATE`
/// locks; dropping the sqlx transaction without commit rolls it back.
struct PgLedgerUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUnit for PgLedgerUnit {
    #[instrument(skip(self))]
    async fn get_account_by_number(
        &mut self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_number = $1 FOR UPDATE"
        ))
        .bind(account_number)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| store_error("Failed to lock account", e))
    }

    #[instrument(skip(self))]
    async fn get_account_for_update(&mut self, id: i64) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| store_error("Failed to lock account", e))
    }

    #[instrument(skip(self, account), fields(account_number = %account.account_number))]
    async fn insert_account(&mut self, account: &NewAccount) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (account_number, balance)
            VALUES ($1, $2)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&account.account_number)
        .bind(account.balance)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| store_error("Failed to create account", e))
    }

    #[instrument(skip(self, account), fields(account_id = account.id))]
    async fn save_account(&mut self, account: &Account) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET balance = $2, updated_utc = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(account.balance)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| store_error("Failed to update account", e))?
        .ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("account {} does not exist", account.id))
        })
    }

    #[instrument(skip(self, transfer), fields(from = transfer.from_account_id, to = transfer.to_account_id))]
    async fn create_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<TransferRecord, StoreError> {
        sqlx::query_as::<_, TransferRecord>(&format!(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {TRANSFER_COLUMNS}
            "#
        ))
        .bind(transfer.from_account_id)
        .bind(transfer.to_account_id)
        .bind(transfer.amount)
        .bind(&transfer.description)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| store_error("Failed to create transfer record", e))
    }

    #[instrument(skip(self, entry), fields(account_id = entry.account_id, reference = %entry.reference))]
    async fn create_entry(&mut self, entry: &NewEntry) -> Result<LedgerEntry, StoreError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            INSERT INTO ledger_entries (account_id, kind, amount, reference, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(entry.account_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount)
        .bind(&entry.reference)
        .bind(&entry.description)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| store_error("Failed to insert entry", e))?;

        row.try_into()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| store_error("Failed to commit transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| store_error("Failed to roll back transaction", e))
    }
}
