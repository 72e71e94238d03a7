use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice status notification posted by the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCallback {
    /// Provider invoice id.
    pub id: String,
    /// The booking id we passed when creating the invoice.
    pub external_id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub paid_amount: Option<Decimal>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Status values the reconciler reacts to. Anything else is accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    Paid,
    Expired,
    Other(String),
}

impl CallbackStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PAID" | "SETTLED" => CallbackStatus::Paid,
            "EXPIRED" => CallbackStatus::Expired,
            other => CallbackStatus::Other(other.to_string()),
        }
    }
}
