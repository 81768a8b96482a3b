//! Lifecycle and policy tests that run without a database: status
//! machines, money math and role gates exercised through the library's
//! public API.

use backoffice_service::middleware::CurrentUser;
use backoffice_service::models::{
    Invoice, InvoiceStatus, LineInput, LoadStatus, Profile, QuoteStatus, Role,
};
use backoffice_service::services::numbering::{fallback_document_number, DocumentKind};
use backoffice_service::services::totals::{compute_totals, totals_out_of_sync, DocumentTotals};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

fn profile_with_role(role: Role, company_id: Option<Uuid>) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        company_id,
        email: "user@example.com".to_string(),
        full_name: "Test User".to_string(),
        role: role.as_str().to_string(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn user_with_role(role: Role, company_id: Option<Uuid>) -> CurrentUser {
    CurrentUser {
        profile: profile_with_role(role, company_id),
        role,
    }
}

#[test]
fn quote_walks_the_full_happy_path() {
    let path = [
        (QuoteStatus::Draft, QuoteStatus::Sent),
        (QuoteStatus::Sent, QuoteStatus::Accepted),
        (QuoteStatus::Accepted, QuoteStatus::Converted),
    ];
    for (from, to) in path {
        assert!(from.can_transition_to(to), "{:?} -> {:?}", from, to);
    }
}

#[test]
fn converted_and_rejected_quotes_are_terminal() {
    for from in [QuoteStatus::Converted, QuoteStatus::Rejected] {
        for to in [
            QuoteStatus::Draft,
            QuoteStatus::Sent,
            QuoteStatus::Accepted,
            QuoteStatus::Converted,
        ] {
            assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
        }
    }
}

#[test]
fn load_round_trip_through_cancellation() {
    // A cancelled load reopens to pending and can be dispatched again.
    assert!(LoadStatus::Assigned.can_transition_to(LoadStatus::Cancelled));
    assert!(LoadStatus::Cancelled.can_transition_to(LoadStatus::Pending));
    assert!(LoadStatus::Pending.can_transition_to(LoadStatus::Assigned));
    assert!(LoadStatus::Assigned.can_transition_to(LoadStatus::InTransit));
    assert!(LoadStatus::InTransit.can_transition_to(LoadStatus::Delivered));
}

fn invoice_with_status(status: &str) -> Invoice {
    Invoice {
        id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        quote_id: None,
        load_id: None,
        invoice_number: "INV-2608-0001".to_string(),
        currency: "USD".to_string(),
        tax_rate: Decimal::ZERO,
        subtotal: "100.00".parse().unwrap(),
        tax_amount: Decimal::ZERO,
        total_amount: "100.00".parse().unwrap(),
        amount_paid: Decimal::ZERO,
        status: status.to_string(),
        due_date: None,
        paid_at: None,
        notes: None,
        created_by: Uuid::new_v4(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn invoice_settlement_states_do_not_regress() {
    assert!(!InvoiceStatus::Paid.is_editable());
    assert!(!InvoiceStatus::Refunded.is_refundable());
    assert!(!InvoiceStatus::Cancelled.reminder_allowed());
}

// A second payment call against a settled invoice must short-circuit to
// success instead of charging or writing a second ledger entry.
#[test]
fn settled_invoices_answer_repeat_payment_calls_idempotently() {
    assert!(invoice_with_status("paid").is_settled());
    assert!(!invoice_with_status("pending").is_settled());
    assert!(!invoice_with_status("refunded").is_settled());
}

// Quote edits are guarded in SQL to exactly these two statuses; the
// model predicate and the guard must agree.
#[test]
fn quote_edits_are_limited_to_draft_and_sent() {
    assert!(QuoteStatus::Draft.is_editable());
    assert!(QuoteStatus::Sent.is_editable());
    for status in [
        QuoteStatus::Approved,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
        QuoteStatus::Expired,
        QuoteStatus::Converted,
    ] {
        assert!(!status.is_editable(), "{:?}", status);
    }
}

#[test]
fn totals_follow_the_documented_rounding() {
    let items = vec![
        LineInput {
            description: "Line haul".to_string(),
            quantity: Decimal::from(2),
            unit_price: Decimal::from(100),
        },
        LineInput {
            description: "Detention".to_string(),
            quantity: Decimal::from(1),
            unit_price: Decimal::from(50),
        },
    ];
    let totals = compute_totals(&items, Decimal::from(15));
    assert_eq!(totals.subtotal, "250.00".parse::<Decimal>().unwrap());
    assert_eq!(totals.tax_amount, "37.50".parse::<Decimal>().unwrap());
    assert_eq!(totals.total_amount, "287.50".parse::<Decimal>().unwrap());
}

#[test]
fn reconciliation_tolerates_a_single_cent() {
    let stored = DocumentTotals {
        subtotal: "99.99".parse().unwrap(),
        tax_amount: "8.00".parse().unwrap(),
        total_amount: "107.99".parse().unwrap(),
    };
    let mut recomputed = stored;
    recomputed.subtotal = "100.00".parse().unwrap();
    assert!(!totals_out_of_sync(&stored, &recomputed));

    recomputed.subtotal = "100.01".parse().unwrap();
    assert!(totals_out_of_sync(&stored, &recomputed));
}

#[test]
fn fallback_numbers_carry_kind_and_period() {
    let date = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
    assert!(fallback_document_number(DocumentKind::Quote, date).starts_with("QT-2608-"));
    assert!(fallback_document_number(DocumentKind::Invoice, date).starts_with("INV-2608-"));
    assert!(fallback_document_number(DocumentKind::Load, date).starts_with("LD-2608-"));
}

#[test]
fn dispatcher_passes_dispatch_gate_but_not_billing() {
    let dispatcher = user_with_role(Role::Dispatcher, Some(Uuid::new_v4()));
    assert!(dispatcher
        .require_role(&[Role::CompanyAdmin, Role::Manager, Role::Dispatcher])
        .is_ok());
    assert!(dispatcher
        .require_role(&[Role::CompanyAdmin, Role::Manager])
        .is_err());
    assert!(dispatcher.require_super_admin().is_err());
}

#[test]
fn driver_fails_every_write_gate() {
    let driver = user_with_role(Role::Driver, Some(Uuid::new_v4()));
    assert!(driver
        .require_role(&[Role::CompanyAdmin, Role::Manager, Role::Dispatcher])
        .is_err());
}

#[test]
fn super_admin_passes_any_role_gate() {
    let admin = user_with_role(Role::SuperAdmin, None);
    assert!(admin.require_role(&[Role::Driver]).is_ok());
    assert!(admin.require_super_admin().is_ok());
}

#[test]
fn super_admin_gate_rejects_others_with_forbidden() {
    let manager = user_with_role(Role::Manager, Some(Uuid::new_v4()));
    let err = manager.require_super_admin().unwrap_err();
    match err {
        AppError::Forbidden(e) => assert_eq!(e.to_string(), "Super admin access required"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn super_admin_has_no_company_scope() {
    let admin = user_with_role(Role::SuperAdmin, None);
    assert!(admin.company_id().is_err());

    let company_id = Uuid::new_v4();
    let manager = user_with_role(Role::Manager, Some(company_id));
    assert_eq!(manager.company_id().unwrap(), company_id);
}
