//! Observability sink for ledger operations.
//!
//! The engine and the account service report outcomes here instead of
//! touching process-wide instrumentation, so both run without a telemetry
//! backend. Notifications are not part of any operation's correctness.

use crate::error::ErrorKind;
use crate::models::{Account, Transfer};

pub trait LedgerObserver: Send + Sync {
    fn transfer_succeeded(&self, _transfer: &Transfer) {}

    fn transfer_failed(&self, _kind: ErrorKind) {}

    fn account_created(&self, _account: &Account) {}

    /// Called with the account as it stands after a balance mutation.
    fn balance_changed(&self, _account: &Account) {}
}

/// Observer that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LedgerObserver for NoopObserver {}
