//! Quote model and lifecycle.
//!
//! `expired` is never written by this service: it is derived at read time
//! from `valid_until` while the stored status is still `sent`. The legacy
//! `approved` value can occur in rows written by the previous system and is
//! treated as accepted-equivalent for conversion.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Quote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Approved,
    Accepted,
    Rejected,
    Expired,
    Converted,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
            QuoteStatus::Converted => "converted",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => QuoteStatus::Sent,
            "approved" => QuoteStatus::Approved,
            "accepted" => QuoteStatus::Accepted,
            "rejected" => QuoteStatus::Rejected,
            "expired" => QuoteStatus::Expired,
            "converted" => QuoteStatus::Converted,
            _ => QuoteStatus::Draft,
        }
    }

    /// Explicit transition table. Anything not listed is rejected.
    pub fn can_transition_to(self, next: QuoteStatus) -> bool {
        matches!(
            (self, next),
            (QuoteStatus::Draft, QuoteStatus::Sent)
                | (QuoteStatus::Sent, QuoteStatus::Accepted)
                | (QuoteStatus::Sent, QuoteStatus::Rejected)
                | (QuoteStatus::Accepted, QuoteStatus::Converted)
                | (QuoteStatus::Approved, QuoteStatus::Converted)
        )
    }

    /// Editing is only permitted while the quote is draft or sent.
    pub fn is_editable(self) -> bool {
        matches!(self, QuoteStatus::Draft | QuoteStatus::Sent)
    }

    /// Deletion is only permitted while the quote is a draft.
    pub fn is_deletable(self) -> bool {
        matches!(self, QuoteStatus::Draft)
    }

    pub fn is_convertible(self) -> bool {
        matches!(self, QuoteStatus::Accepted | QuoteStatus::Approved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub quote_number: String,
    pub currency: String,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub status: String,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub converted_to_invoice_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn status(&self) -> QuoteStatus {
        QuoteStatus::from_string(&self.status)
    }

    /// Read-time status: a sent quote past its validity date reads as
    /// expired without a stored transition.
    pub fn effective_status(&self, today: NaiveDate) -> QuoteStatus {
        let stored = self.status();
        match (stored, self.valid_until) {
            (QuoteStatus::Sent, Some(valid_until)) if valid_until < today => QuoteStatus::Expired,
            _ => stored,
        }
    }

    /// Acceptance requires the quote to still be within its validity window.
    pub fn is_acceptable(&self, today: NaiveDate) -> bool {
        self.status() == QuoteStatus::Sent
            && self.valid_until.map(|d| d >= today).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteItem {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Input for creating a quote. Totals are always recomputed server-side
/// from the items before the insert.
#[derive(Debug, Clone)]
pub struct CreateQuote {
    pub customer_id: Uuid,
    pub currency: String,
    pub tax_rate: Decimal,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<super::LineInput>,
}

/// Input for updating a quote (draft or sent only).
#[derive(Debug, Clone)]
pub struct UpdateQuote {
    pub customer_id: Option<Uuid>,
    pub currency: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Option<Vec<super::LineInput>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_can_only_be_sent() {
        assert!(QuoteStatus::Draft.can_transition_to(QuoteStatus::Sent));
        assert!(!QuoteStatus::Draft.can_transition_to(QuoteStatus::Accepted));
        assert!(!QuoteStatus::Draft.can_transition_to(QuoteStatus::Converted));
    }

    #[test]
    fn sent_resolves_to_accepted_or_rejected() {
        assert!(QuoteStatus::Sent.can_transition_to(QuoteStatus::Accepted));
        assert!(QuoteStatus::Sent.can_transition_to(QuoteStatus::Rejected));
        assert!(!QuoteStatus::Sent.can_transition_to(QuoteStatus::Draft));
    }

    #[test]
    fn only_accepted_or_legacy_approved_convert() {
        assert!(QuoteStatus::Accepted.can_transition_to(QuoteStatus::Converted));
        assert!(QuoteStatus::Approved.can_transition_to(QuoteStatus::Converted));
        assert!(!QuoteStatus::Rejected.can_transition_to(QuoteStatus::Converted));
        assert!(!QuoteStatus::Converted.can_transition_to(QuoteStatus::Accepted));
    }

    #[test]
    fn editability_follows_status() {
        assert!(QuoteStatus::Draft.is_editable());
        assert!(QuoteStatus::Sent.is_editable());
        assert!(!QuoteStatus::Accepted.is_editable());
        assert!(QuoteStatus::Draft.is_deletable());
        assert!(!QuoteStatus::Sent.is_deletable());
    }

    fn quote_with(status: &str, valid_until: Option<NaiveDate>) -> Quote {
        Quote {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            quote_number: "QT-2501-0001".to_string(),
            currency: "USD".to_string(),
            tax_rate: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            status: status.to_string(),
            valid_until,
            notes: None,
            converted_to_invoice_id: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sent_quote_past_validity_reads_as_expired() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let quote = quote_with("sent", NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(quote.effective_status(today), QuoteStatus::Expired);
        assert!(!quote.is_acceptable(today));
    }

    #[test]
    fn sent_quote_within_validity_is_acceptable() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let quote = quote_with("sent", NaiveDate::from_ymd_opt(2025, 6, 30));
        assert_eq!(quote.effective_status(today), QuoteStatus::Sent);
        assert!(quote.is_acceptable(today));
    }

    #[test]
    fn draft_never_reads_as_expired() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let quote = quote_with("draft", NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(quote.effective_status(today), QuoteStatus::Draft);
    }
}
