//! Account lifecycle and single-account movements.

use super::observer::LedgerObserver;
use super::repository::{AccountRepository, TransactionRepository};
use crate::error::LedgerError;
use crate::models::{
    Account, LedgerEntry, MAX_ACCOUNT_NUMBER_LEN, NewAccount, NewEntry, TransactionKind, entry,
    money,
};
use crate::store::{LedgerStore, StoreError, run_in_transaction};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const INITIAL_DEPOSIT_DESCRIPTION: &str = "Initial deposit";

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
    accounts: AccountRepository,
    transactions: TransactionRepository,
    observer: Arc<dyn LedgerObserver>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>, observer: Arc<dyn LedgerObserver>) -> Self {
        Self {
            accounts: AccountRepository::new(store.clone()),
            transactions: TransactionRepository::new(store.clone()),
            store,
            observer,
        }
    }

    /// Create an account. A positive opening balance is recorded as a
    /// deposit entry in the same unit, so the account never exists without
    /// the entry that explains its balance.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        account_number: &str,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        let account_number = validate_account_number(account_number)?;
        let balance = money::opening_balance(initial_balance)?;

        let account = run_in_transaction(self.store.as_ref(), move |unit| {
            Box::pin(async move {
                let account = unit
                    .insert_account(&NewAccount {
                        account_number: account_number.clone(),
                        balance,
                    })
                    .await
                    .map_err(|e| match e {
                        StoreError::UniqueViolation(_) => {
                            LedgerError::DuplicateAccountNumber(account_number)
                        }
                        other => LedgerError::from(other),
                    })?;

                if balance > Decimal::ZERO {
                    TransactionRepository::record(
                        unit,
                        NewEntry {
                            account_id: account.id,
                            kind: TransactionKind::Deposit,
                            amount: balance,
                            reference: entry::initial_deposit_reference(account.id),
                            description: INITIAL_DEPOSIT_DESCRIPTION.to_string(),
                        },
                    )
                    .await?;
                }

                Ok::<_, LedgerError>(account)
            })
        })
        .await
        .inspect_err(|e| warn!(kind = %e.kind(), error = %e, "Account creation failed"))?;

        info!(
            account_id = account.id,
            balance = %account.balance,
            "Account created"
        );
        self.observer.account_created(&account);
        self.observer.balance_changed(&account);

        Ok(account)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Account, LedgerError> {
        self.accounts.get(id).await
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Account>, LedgerError> {
        self.accounts.list().await
    }

    /// Entries of an existing account, newest first.
    #[instrument(skip(self))]
    pub async fn list_transactions(&self, id: i64) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.accounts.get(id).await?;
        self.transactions.list_for_account(id).await
    }

    /// Credit an account with a deposit entry.
    #[instrument(skip(self, description))]
    pub async fn deposit(
        &self,
        id: i64,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<LedgerEntry, LedgerError> {
        self.apply_movement(
            id,
            TransactionKind::Deposit,
            amount,
            description.unwrap_or_else(|| "Deposit".to_string()),
        )
        .await
    }

    /// Debit an account with a withdrawal entry. The balance may not go below
    /// zero.
    #[instrument(skip(self, description))]
    pub async fn withdraw(
        &self,
        id: i64,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<LedgerEntry, LedgerError> {
        self.apply_movement(
            id,
            TransactionKind::Withdrawal,
            amount,
            description.unwrap_or_else(|| "Withdrawal".to_string()),
        )
        .await
    }

    async fn apply_movement(
        &self,
        id: i64,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
    ) -> Result<LedgerEntry, LedgerError> {
        let amount = money::positive_amount(amount)?;

        let (account, posted) = run_in_transaction(self.store.as_ref(), move |unit| {
            Box::pin(async move {
                let mut account = AccountRepository::lock_by_id(unit, id).await?;

                let (signed, reference) = match kind {
                    TransactionKind::Withdrawal => {
                        if !account.can_cover(amount) {
                            return Err(LedgerError::InsufficientFunds {
                                account: account.account_number,
                                available: account.balance,
                                requested: amount,
                            });
                        }
                        (-amount, entry::withdrawal_reference())
                    }
                    _ => (amount, entry::deposit_reference()),
                };

                account.balance = money::credit(account.balance, signed)?;
                let account = unit.save_account(&account).await?;

                let posted = TransactionRepository::record(
                    unit,
                    NewEntry {
                        account_id: account.id,
                        kind,
                        amount: signed,
                        reference,
                        description,
                    },
                )
                .await?;

                Ok((account, posted))
            })
        })
        .await
        .inspect_err(|e| warn!(kind = %e.kind(), error = %e, "Balance movement failed"))?;

        info!(
            account_id = account.id,
            reference = %posted.reference,
            balance = %account.balance,
            "{} recorded",
            kind
        );
        self.observer.balance_changed(&account);

        Ok(posted)
    }
}

/// Trim and bound an external account number.
fn validate_account_number(raw: &str) -> Result<String, LedgerError> {
    let number = raw.trim();
    if number.is_empty() {
        return Err(LedgerError::InvalidAccountNumber(
            "account number must not be blank".to_string(),
        ));
    }
    if number.chars().count() > MAX_ACCOUNT_NUMBER_LEN {
        return Err(LedgerError::InvalidAccountNumber(format!(
            "account number longer than {} characters",
            MAX_ACCOUNT_NUMBER_LEN
        )));
    }
    Ok(number.to_string())
}
