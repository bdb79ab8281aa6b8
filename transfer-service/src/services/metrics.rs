//! Prometheus metrics for transfer-service.
//!
//! Metrics live in a registry owned by [`LedgerMetrics`] rather than the
//! default global one; the instance is shared with the engine, the account
//! service and the HTTP middleware.

use super::observer::LedgerObserver;
use crate::error::ErrorKind;
use crate::models::{Account, Transfer};
use prometheus::{
    Counter, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use service_core::middleware::HttpMetricsRecorder;
use std::time::Duration;

pub struct LedgerMetrics {
    registry: Registry,
    transfers_total: IntCounterVec,
    transfer_amount_total: Counter,
    accounts_created_total: IntCounter,
    account_balance: GaugeVec,
    http_requests_total: IntCounterVec,
    http_request_duration: HistogramVec,
}

impl LedgerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let transfers_total = IntCounterVec::new(
            Opts::new("ledger_transfers_total", "Total number of transfers by outcome"),
            &["status"], // success or an error kind
        )?;
        let transfer_amount_total = Counter::new(
            "ledger_transfer_amount_total",
            "Total amount moved by successful transfers",
        )?;
        let accounts_created_total = IntCounter::new(
            "ledger_accounts_created_total",
            "Total number of accounts created",
        )?;
        let account_balance = GaugeVec::new(
            Opts::new("ledger_account_balance", "Current balance of an account"),
            &["account_number"],
        )?;
        let http_requests_total = IntCounterVec::new(
            Opts::new("ledger_http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "ledger_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["method", "path"],
        )?;

        registry.register(Box::new(transfers_total.clone()))?;
        registry.register(Box::new(transfer_amount_total.clone()))?;
        registry.register(Box::new(accounts_created_total.clone()))?;
        registry.register(Box::new(account_balance.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registry,
            transfers_total,
            transfer_amount_total,
            accounts_created_total,
            account_balance,
            http_requests_total,
            http_request_duration,
        })
    }

    /// Get metrics in Prometheus text format.
    pub fn render(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}

impl LedgerObserver for LedgerMetrics {
    fn transfer_succeeded(&self, transfer: &Transfer) {
        self.transfers_total.with_label_values(&["success"]).inc();
        self.transfer_amount_total
            .inc_by(transfer.amount().to_f64().unwrap_or_default());
    }

    fn transfer_failed(&self, kind: ErrorKind) {
        self.transfers_total.with_label_values(&[kind.as_str()]).inc();
    }

    fn account_created(&self, _account: &Account) {
        self.accounts_created_total.inc();
    }

    fn balance_changed(&self, account: &Account) {
        self.account_balance
            .with_label_values(&[account.account_number.as_str()])
            .set(account.balance.to_f64().unwrap_or_default());
    }
}

impl HttpMetricsRecorder for LedgerMetrics {
    fn record_request(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, path])
            .observe(elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransferRecord;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(number: &str, balance: rust_decimal::Decimal) -> Account {
        Account {
            id: 1,
            account_number: number.to_string(),
            balance,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn records_transfer_outcomes() {
        let metrics = LedgerMetrics::new().unwrap();
        let transfer = Transfer {
            record: TransferRecord {
                id: 1,
                from_account_id: 1,
                to_account_id: 2,
                amount: dec!(40.00),
                description: "rent".to_string(),
                created_utc: Utc::now(),
            },
            reference: "TRF-1".to_string(),
            from_account: account("A", dec!(60.00)),
            to_account: account("B", dec!(40.00)),
            entries: Vec::new(),
        };

        metrics.transfer_succeeded(&transfer);
        metrics.transfer_failed(ErrorKind::InsufficientFunds);
        metrics.balance_changed(&transfer.from_account);

        let text = metrics.render();
        assert!(text.contains("ledger_transfers_total{status=\"success\"} 1"));
        assert!(text.contains("ledger_transfers_total{status=\"insufficient_funds\"} 1"));
        assert!(text.contains("ledger_transfer_amount_total 40"));
        assert!(text.contains("ledger_account_balance{account_number=\"A\"} 60"));
    }

    #[test]
    fn separate_instances_do_not_share_state() {
        let first = LedgerMetrics::new().unwrap();
        let second = LedgerMetrics::new().unwrap();

        first.account_created(&account("A", dec!(0)));

        assert!(first.render().contains("ledger_accounts_created_total 1"));
        assert!(second.render().contains("ledger_accounts_created_total 0"));
    }

    #[test]
    fn records_http_requests() {
        let metrics = LedgerMetrics::new().unwrap();
        metrics.record_request("GET", "/api/accounts/:id", 200, Duration::from_millis(3));

        let text = metrics.render();
        assert!(text.contains(
            "ledger_http_requests_total{method=\"GET\",path=\"/api/accounts/:id\",status=\"200\"} 1"
        ));
    }
}
