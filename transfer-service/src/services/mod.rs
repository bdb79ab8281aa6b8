//! Services layer for transfer-service.

mod account;
mod metrics;
mod observer;
mod repository;
mod transfer;

pub use account::AccountService;
pub use metrics::LedgerMetrics;
pub use observer::{LedgerObserver, NoopObserver};
pub use repository::{AccountRepository, TransactionRepository};
pub use transfer::{DEFAULT_TRANSFER_TIMEOUT, TransferEngine};
