//! Money amounts.
//!
//! Balances and amounts are fixed-point decimals with two minor-unit digits.

use crate::error::LedgerError;
use crate::store::StoreError;
use rust_decimal::Decimal;

/// Digits after the decimal point every stored amount carries.
pub const MONEY_SCALE: u32 = 2;

/// Exclusive magnitude bound of a stored amount or balance. Matches the
/// `NUMERIC(19,2)` columns: 17 integer digits.
pub const MONEY_LIMIT: Decimal = Decimal::from_parts(1569325056, 23283064, 0, false, 0);

/// Validate an amount that must move value (transfer, deposit, withdrawal).
pub fn positive_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    to_money(amount)
}

/// Validate an opening balance, which may be zero.
pub fn opening_balance(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::InvalidAmount(amount));
    }
    to_money(amount)
}

/// Reject sub-cent precision and pin the scale so every store returns the
/// same representation.
fn to_money(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount.normalize().scale() > MONEY_SCALE || amount.abs() >= MONEY_LIMIT {
        return Err(LedgerError::InvalidAmount(amount));
    }
    let mut money = amount;
    money.rescale(MONEY_SCALE);
    if money.scale() != MONEY_SCALE {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(money)
}

/// Add a validated amount to a balance. A result the store cannot hold is a
/// storage failure, not a bad amount.
pub fn credit(balance: Decimal, amount: Decimal) -> Result<Decimal, LedgerError> {
    balance
        .checked_add(amount)
        .filter(|total| total.abs() < MONEY_LIMIT)
        .ok_or_else(|| {
            LedgerError::from(StoreError::Backend(anyhow::anyhow!(
                "balance {} plus {} exceeds the storable range",
                balance,
                amount
            )))
        })
}
