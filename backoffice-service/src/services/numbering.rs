//! Document numbering: human-readable, company-unique identifiers for
//! quotes, invoices and loads.
//!
//! The primary path is the `next_document_number` SQL function, an atomic
//! counter scoped to (company, kind). When that call fails or
//! returns empty the caller gets a best-effort fallback number instead;
//! the fallback is not guaranteed unique and only appears on
//! infrastructure failure.

use chrono::{Datelike, NaiveDate, Utc};
use rand::Rng;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

/// Document kind tag, matching the `kind` column of `document_counters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Quote,
    Invoice,
    Load,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "quote",
            DocumentKind::Invoice => "invoice",
            DocumentKind::Load => "load",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "QT",
            DocumentKind::Invoice => "INV",
            DocumentKind::Load => "LD",
        }
    }
}

/// Next number from the atomic server-side sequence, degrading to the
/// synthesized fallback when the call errors or comes back empty.
pub async fn next_document_number(
    pool: &PgPool,
    company_id: Uuid,
    kind: DocumentKind,
) -> String {
    let result: Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT next_document_number($1, $2)")
            .bind(company_id)
            .bind(kind.as_str())
            .fetch_one(pool)
            .await;

    match result {
        Ok(Some(number)) if !number.is_empty() => number,
        Ok(_) => {
            crate::services::metrics::NUMBER_FALLBACKS_TOTAL
                .with_label_values(&[kind.as_str()])
                .inc();
            warn!(
                company_id = %company_id,
                kind = kind.as_str(),
                "Sequence returned empty document number, using fallback"
            );
            fallback_document_number(kind, Utc::now().date_naive())
        }
        Err(err) => {
            crate::services::metrics::NUMBER_FALLBACKS_TOTAL
                .with_label_values(&[kind.as_str()])
                .inc();
            warn!(
                company_id = %company_id,
                kind = kind.as_str(),
                error = %err,
                "Sequence call failed, using fallback document number"
            );
            fallback_document_number(kind, Utc::now().date_naive())
        }
    }
}

/// `PREFIX-YYMM-NNNN` with a random suffix, e.g. `INV-2501-0234`.
pub fn fallback_document_number(kind: DocumentKind, date: NaiveDate) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!(
        "{}-{:02}{:02}-{:04}",
        kind.prefix(),
        date.year() % 100,
        date.month(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_uses_prefix_year_month_and_random_suffix() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let number = fallback_document_number(DocumentKind::Invoice, date);
        assert!(number.starts_with("INV-2501-"), "got {}", number);
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn fallback_prefixes_differ_by_kind() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        assert!(fallback_document_number(DocumentKind::Quote, date).starts_with("QT-2511-"));
        assert!(fallback_document_number(DocumentKind::Load, date).starts_with("LD-2511-"));
    }
}
