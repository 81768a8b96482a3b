//! Invoice model and lifecycle.
//!
//! `overdue` is a read-time status (`pending` past its due date), not a
//! persisted value. `mark_paid` is idempotent at the repository level.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
    Refunded,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "cancelled" => InvoiceStatus::Cancelled,
            "refunded" => InvoiceStatus::Refunded,
            _ => InvoiceStatus::Pending,
        }
    }

    /// Editing and cancellation only apply to invoices still pending.
    pub fn is_editable(self) -> bool {
        matches!(self, InvoiceStatus::Pending)
    }

    /// Reminders go out unless the invoice is already settled or cancelled.
    pub fn reminder_allowed(self) -> bool {
        !matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    pub fn is_refundable(self) -> bool {
        matches!(self, InvoiceStatus::Paid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub load_id: Option<Uuid>,
    pub invoice_number: String,
    pub currency: String,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    /// Settled invoices answer repeated payment calls with success and
    /// no new ledger entry.
    pub fn is_settled(&self) -> bool {
        self.status() == InvoiceStatus::Paid
    }

    /// Read-time status: a pending invoice past its due date reads as
    /// overdue without a stored transition.
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        let stored = self.status();
        match (stored, self.due_date) {
            (InvoiceStatus::Pending, Some(due)) if due < today => InvoiceStatus::Overdue,
            _ => stored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Input for creating an invoice, either manually or from a quote
/// conversion. Totals are always recomputed server-side from the items.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub load_id: Option<Uuid>,
    pub currency: String,
    pub tax_rate: Decimal,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<super::LineInput>,
}

/// Input for updating an invoice (pending only).
#[derive(Debug, Clone)]
pub struct UpdateInvoice {
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Option<Vec<super::LineInput>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_with(status: &str, due_date: Option<NaiveDate>) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            quote_id: None,
            load_id: None,
            invoice_number: "INV-2501-0001".to_string(),
            currency: "USD".to_string(),
            tax_rate: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            status: status.to_string(),
            due_date,
            paid_at: None,
            notes: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_past_due_reads_as_overdue() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let invoice = invoice_with("pending", NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(invoice.effective_status(today), InvoiceStatus::Overdue);
    }

    #[test]
    fn paid_never_reads_as_overdue() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let invoice = invoice_with("paid", NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(invoice.effective_status(today), InvoiceStatus::Paid);
    }

    #[test]
    fn reminders_blocked_for_paid_and_cancelled() {
        assert!(InvoiceStatus::Pending.reminder_allowed());
        assert!(InvoiceStatus::Overdue.reminder_allowed());
        assert!(!InvoiceStatus::Paid.reminder_allowed());
        assert!(!InvoiceStatus::Cancelled.reminder_allowed());
    }

    #[test]
    fn only_paid_invoices_are_settled() {
        assert!(invoice_with("paid", None).is_settled());
        assert!(!invoice_with("pending", None).is_settled());
        assert!(!invoice_with("refunded", None).is_settled());
        assert!(!invoice_with("cancelled", None).is_settled());
    }

    #[test]
    fn only_paid_invoices_refund() {
        assert!(InvoiceStatus::Paid.is_refundable());
        assert!(!InvoiceStatus::Pending.is_refundable());
        assert!(!InvoiceStatus::Refunded.is_refundable());
    }
}
