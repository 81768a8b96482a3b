//! Expense model: company cost records with an approval workflow and an
//! optional uploaded receipt.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Expense status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "approved" => ExpenseStatus::Approved,
            "rejected" => ExpenseStatus::Rejected,
            _ => ExpenseStatus::Pending,
        }
    }

    /// Only pending expenses can be approved or rejected.
    pub fn is_reviewable(self) -> bool {
        matches!(self, ExpenseStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub company_id: Uuid,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub load_id: Option<Uuid>,
    pub vehicle_unit: Option<String>,
    pub receipt_path: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn status(&self) -> ExpenseStatus {
        ExpenseStatus::from_string(&self.status)
    }
}

/// Input for creating an expense.
#[derive(Debug, Clone)]
pub struct CreateExpense {
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub load_id: Option<Uuid>,
    pub vehicle_unit: Option<String>,
}

/// Input for updating a pending expense.
#[derive(Debug, Clone, Default)]
pub struct UpdateExpense {
    pub category: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub load_id: Option<Uuid>,
    pub vehicle_unit: Option<String>,
}
