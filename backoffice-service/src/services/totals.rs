//! Monetary calculation for quotes and invoices.
//!
//! Subtotal and tax are each rounded to two decimals before the total is
//! derived, so the stored total never carries a compounded rounding error.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::LineInput;

/// Computed money fields of a quote or invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl DocumentTotals {
    pub const ZERO: DocumentTotals = DocumentTotals {
        subtotal: Decimal::ZERO,
        tax_amount: Decimal::ZERO,
        total_amount: Decimal::ZERO,
    };
}

/// Half-up rounding to cents.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-line amount. Negative quantities and prices are rejected by request
/// validation before this is reached; nothing is clamped here.
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Decimal {
    round2(quantity * unit_price)
}

/// Derive subtotal, tax and total from the line items and a percentage tax
/// rate. An empty item list yields all zeros.
pub fn compute_totals(items: &[LineInput], tax_rate: Decimal) -> DocumentTotals {
    let subtotal: Decimal = items
        .iter()
        .map(|item| line_total(item.quantity, item.unit_price))
        .sum();

    let tax_amount = round2(subtotal * tax_rate / Decimal::from(100));
    let total_amount = round2(subtotal) + tax_amount;

    DocumentTotals {
        subtotal: round2(subtotal),
        tax_amount,
        total_amount,
    }
}

/// Reconciliation check for the "totals out of sync" warning: recompute
/// from the stored items and flag a mismatch beyond a cent. Reports only;
/// never corrects the stored figures.
pub fn totals_out_of_sync(stored: &DocumentTotals, recomputed: &DocumentTotals) -> bool {
    let tolerance = Decimal::new(1, 2); // 0.01
    (stored.subtotal - recomputed.subtotal).abs() > tolerance
        || (stored.tax_amount - recomputed.tax_amount).abs() > tolerance
        || (stored.total_amount - recomputed.total_amount).abs() > tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: &str, unit_price: &str) -> LineInput {
        LineInput {
            description: "test line".to_string(),
            quantity: quantity.parse().unwrap(),
            unit_price: unit_price.parse().unwrap(),
        }
    }

    #[test]
    fn two_items_with_fifteen_percent_tax() {
        let items = vec![item("2", "100"), item("1", "50")];
        let totals = compute_totals(&items, Decimal::from(15));
        assert_eq!(totals.subtotal, "250.00".parse::<Decimal>().unwrap());
        assert_eq!(totals.tax_amount, "37.50".parse::<Decimal>().unwrap());
        assert_eq!(totals.total_amount, "287.50".parse::<Decimal>().unwrap());
    }

    #[test]
    fn empty_item_list_is_all_zeros() {
        let totals = compute_totals(&[], Decimal::from(20));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total_amount, Decimal::ZERO);
    }

    #[test]
    fn total_equals_rounded_subtotal_plus_rounded_tax() {
        // Fractional cents on both the lines and the tax.
        let items = vec![item("3", "33.335"), item("1.5", "9.999")];
        let totals = compute_totals(&items, "7.25".parse().unwrap());
        assert_eq!(
            totals.total_amount,
            round2(totals.subtotal) + totals.tax_amount
        );
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round2("1.005".parse().unwrap()), "1.01".parse::<Decimal>().unwrap());
        assert_eq!(round2("1.004".parse().unwrap()), "1.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn reconciliation_flags_drift_beyond_a_cent() {
        let stored = DocumentTotals {
            subtotal: "100.00".parse().unwrap(),
            tax_amount: "10.00".parse().unwrap(),
            total_amount: "110.00".parse().unwrap(),
        };
        let mut recomputed = stored;
        assert!(!totals_out_of_sync(&stored, &recomputed));

        recomputed.total_amount = "110.01".parse().unwrap();
        assert!(!totals_out_of_sync(&stored, &recomputed));

        recomputed.total_amount = "110.02".parse().unwrap();
        assert!(totals_out_of_sync(&stored, &recomputed));
    }
}
