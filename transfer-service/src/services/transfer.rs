//! Transfer engine: moves value between two accounts as one atomic unit.

use super::observer::LedgerObserver;
use super::repository::{AccountRepository, TransactionRepository};
use crate::error::LedgerError;
use crate::models::{
    NewEntry, NewTransfer, TransactionKind, Transfer, TransferRequest, money,
};
use crate::store::{LedgerStore, run_in_transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Upper bound on a transfer's time in the store unless configured otherwise.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
    accounts: AccountRepository,
    transactions: TransactionRepository,
    observer: Arc<dyn LedgerObserver>,
    timeout: Duration,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>, observer: Arc<dyn LedgerObserver>) -> Self {
        Self {
            accounts: AccountRepository::new(store.clone()),
            transactions: TransactionRepository::new(store.clone()),
            store,
            observer,
            timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute a transfer. Either both balances move and both entries exist,
    /// or nothing changed. A transfer still running when the timeout expires
    /// is abandoned and its unit rolled back.
    #[instrument(
        skip(self, request),
        fields(
            from = %request.from_account_number,
            to = %request.to_account_number,
            amount = %request.amount
        )
    )]
    pub async fn execute(&self, request: TransferRequest) -> Result<Transfer, LedgerError> {
        let outcome = self.execute_with_timeout(request).await;
        self.report(&outcome);
        outcome
    }

    /// Like [`execute`](Self::execute), but also abandons the transfer as soon
    /// as `cancel` fires. A cancelled transfer leaves no trace.
    #[instrument(
        skip(self, request, cancel),
        fields(
            from = %request.from_account_number,
            to = %request.to_account_number,
            amount = %request.amount
        )
    )]
    pub async fn execute_cancellable(
        &self,
        request: TransferRequest,
        cancel: &CancellationToken,
    ) -> Result<Transfer, LedgerError> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LedgerError::Cancelled),
            result = self.execute_with_timeout(request) => result,
        };
        self.report(&outcome);
        outcome
    }

    /// Fetch a transfer with current snapshots of both accounts and its
    /// two ledger entries.
    #[instrument(skip(self))]
    pub async fn lookup(&self, transfer_id: i64) -> Result<Transfer, LedgerError> {
        let record = self.transactions.get_transfer(transfer_id).await?;
        let from_account = self.accounts.get(record.from_account_id).await?;
        let to_account = self.accounts.get(record.to_account_id).await?;
        let reference = record.reference();
        let entries = self.transactions.list_by_reference(&reference).await?;

        Ok(Transfer {
            record,
            reference,
            from_account,
            to_account,
            entries,
        })
    }

    async fn execute_with_timeout(
        &self,
        request: TransferRequest,
    ) -> Result<Transfer, LedgerError> {
        match tokio::time::timeout(self.timeout, self.apply(request)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    async fn apply(&self, request: TransferRequest) -> Result<Transfer, LedgerError> {
        let amount = money::positive_amount(request.amount)?;
        let TransferRequest {
            from_account_number,
            to_account_number,
            description,
            ..
        } = request;
        let from_account_number = from_account_number.trim().to_string();
        let to_account_number = to_account_number.trim().to_string();

        run_in_transaction(self.store.as_ref(), move |unit| {
            Box::pin(async move {
                let (from, to) = AccountRepository::lock_pair_by_number(
                    unit,
                    &from_account_number,
                    &to_account_number,
                )
                .await?;
                let mut from = from.ok_or(LedgerError::AccountNotFound(from_account_number))?;
                let mut to = to.ok_or(LedgerError::AccountNotFound(to_account_number))?;

                if from.id == to.id {
                    return Err(LedgerError::SameAccount);
                }
                if !from.can_cover(amount) {
                    return Err(LedgerError::InsufficientFunds {
                        account: from.account_number,
                        available: from.balance,
                        requested: amount,
                    });
                }

                from.balance -= amount;
                to.balance = money::credit(to.balance, amount)?;

                let from = unit.save_account(&from).await?;
                let to = unit.save_account(&to).await?;

                let record = unit
                    .create_transfer(&NewTransfer {
                        from_account_id: from.id,
                        to_account_id: to.id,
                        amount,
                        description,
                    })
                    .await?;
                let reference = record.reference();

                let debit = TransactionRepository::record(
                    unit,
                    NewEntry {
                        account_id: from.id,
                        kind: TransactionKind::Transfer,
                        amount: -amount,
                        reference: reference.clone(),
                        description: format!("Transfer to {}", to.account_number),
                    },
                )
                .await?;
                let credit = TransactionRepository::record(
                    unit,
                    NewEntry {
                        account_id: to.id,
                        kind: TransactionKind::Transfer,
                        amount,
                        reference: reference.clone(),
                        description: format!("Transfer from {}", from.account_number),
                    },
                )
                .await?;

                Ok(Transfer {
                    record,
                    reference,
                    from_account: from,
                    to_account: to,
                    entries: vec![debit, credit],
                })
            })
        })
        .await
    }

    fn report(&self, outcome: &Result<Transfer, LedgerError>) {
        match outcome {
            Ok(transfer) => {
                info!(
                    transfer_id = transfer.id(),
                    reference = %transfer.reference,
                    from_balance = %transfer.from_account.balance,
                    to_balance = %transfer.to_account.balance,
                    "Transfer completed"
                );
                self.observer.transfer_succeeded(transfer);
                self.observer.balance_changed(&transfer.from_account);
                self.observer.balance_changed(&transfer.to_account);
            }
            Err(err) => {
                warn!(kind = %err.kind(), error = %err, "Transfer failed");
                self.observer.transfer_failed(err.kind());
            }
        }
    }
}
