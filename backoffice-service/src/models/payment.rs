//! Payment ledger rows. Refunds are recorded here even when they do not
//! change the invoice status (partial refunds leave the invoice paid).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Ledger entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Payment,
    Refund,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Payment => "payment",
            PaymentKind::Refund => "refund",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "refund" => PaymentKind::Refund,
            _ => PaymentKind::Payment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub kind: String,
    pub method: Option<String>,
    pub gateway_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn kind(&self) -> PaymentKind {
        PaymentKind::from_string(&self.kind)
    }
}

/// Input for recording a ledger entry against an invoice.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub kind: PaymentKind,
    pub method: Option<String>,
    pub gateway_reference: Option<String>,
}
