use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateAccountRequest {
    pub account_number: String,
    #[serde(default)]
    pub initial_balance: Decimal,
}

/// Body of a deposit or withdrawal.
#[derive(Debug, Deserialize, Serialize)]
pub struct MovementRequest {
    pub amount: Decimal,
    pub description: Option<String>,
}
