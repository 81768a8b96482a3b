//! Invoice lifecycle: pending -> paid, with cancellation, refunds and
//! payment reminders.
//!
//! Marking paid is idempotent: a second call reports success without a
//! second ledger entry. A partial refund leaves the invoice paid; only a
//! refund that brings the refunded total up to the amount paid flips the
//! status to refunded.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    into_line_inputs, CreateInvoiceRequest, InvoiceResponse, ListInvoicesQuery, PayInvoiceRequest,
    RefundInvoiceRequest, ReminderResponse, UpdateInvoiceRequest,
};
use crate::middleware::CurrentUser;
use crate::models::{CreateInvoice, InvoiceStatus, PaymentKind, RecordPayment, Role, UpdateInvoice};
use crate::services::metrics::{DOCUMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL};
use crate::services::numbering::{self, DocumentKind};
use crate::services::totals;
use crate::startup::AppState;

const WRITE_ROLES: &[Role] = &[Role::CompanyAdmin, Role::Manager, Role::Dispatcher];
const BILLING_ROLES: &[Role] = &[Role::CompanyAdmin, Role::Manager];

async fn invoice_response(
    state: &AppState,
    invoice: crate::models::Invoice,
) -> Result<InvoiceResponse, AppError> {
    let items = state.db.get_invoice_items(invoice.id).await?;
    let effective = invoice.effective_status(Utc::now().date_naive());
    Ok(InvoiceResponse {
        invoice,
        effective_status: effective.as_str().to_string(),
        items,
    })
}

pub async fn create_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let customer = state
        .db
        .get_customer(company_id, request.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;
    if !customer.is_active {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot invoice an inactive customer"
        )));
    }

    let currency = request.currency.unwrap_or_else(|| customer.currency.clone());
    let tax_rate = request.tax_rate.unwrap_or(customer.default_tax_rate);
    let due_date = request.due_date.or_else(|| {
        Utc::now()
            .date_naive()
            .checked_add_days(chrono::Days::new(customer.payment_terms_days.max(0) as u64))
    });

    let items = into_line_inputs(request.items);
    let computed = totals::compute_totals(&items, tax_rate);

    let invoice_number =
        numbering::next_document_number(state.db.pool(), company_id, DocumentKind::Invoice).await;

    let invoice = state
        .db
        .create_invoice(
            company_id,
            user.user_id(),
            &invoice_number,
            &CreateInvoice {
                customer_id: customer.id,
                quote_id: request.quote_id,
                load_id: request.load_id,
                currency,
                tax_rate,
                due_date,
                notes: request.notes,
                items,
            },
            &computed,
        )
        .await?;

    DOCUMENTS_TOTAL
        .with_label_values(&["invoice", "pending"])
        .inc();

    Ok((
        StatusCode::CREATED,
        Json(invoice_response(&state, invoice).await?),
    ))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let invoices = state
        .db
        .list_invoices(company_id, query.status, query.customer_id)
        .await?;

    let today = Utc::now().date_naive();
    let responses: Vec<_> = invoices
        .into_iter()
        .map(|invoice| {
            let effective = invoice.effective_status(today);
            serde_json::json!({
                "invoice": invoice,
                "effective_status": effective.as_str(),
            })
        })
        .collect();

    Ok(Json(responses))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let invoice = state
        .db
        .get_invoice(company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    Ok(Json(invoice_response(&state, invoice).await?))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let existing = state
        .db
        .get_invoice(company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if !existing.status().is_editable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot edit an invoice with status '{}'",
            existing.status
        )));
    }

    let items = request.items.map(into_line_inputs);
    let computed = items
        .as_ref()
        .map(|items| totals::compute_totals(items, existing.tax_rate));

    let invoice = state
        .db
        .update_invoice(
            company_id,
            invoice_id,
            &UpdateInvoice {
                due_date: request.due_date,
                notes: request.notes,
                items,
            },
            computed.as_ref(),
        )
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only pending invoices can be edited"))
        })?;

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// Collect payment through the gateway, then settle the invoice and
/// record the ledger entry.
pub async fn pay_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<PayInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(BILLING_ROLES)?;
    let company_id = user.company_id()?;

    let invoice = state
        .db
        .get_invoice(company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    // Idempotent: settled invoices report success without a new charge.
    if invoice.is_settled() {
        return Ok(Json(invoice_response(&state, invoice).await?));
    }
    if invoice.status() != InvoiceStatus::Pending {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot collect payment for an invoice with status '{}'",
            invoice.status
        )));
    }

    let receipt = state
        .gateway
        .charge(invoice.id, invoice.total_amount, &invoice.currency)
        .await?;

    if !receipt.approved {
        return Err(AppError::BadGateway(
            "Payment was declined by the gateway".to_string(),
        ));
    }

    let settled = state
        .db
        .set_invoice_paid(company_id, invoice_id)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Invoice was settled by another request"))
        })?;

    state
        .db
        .insert_payment(
            company_id,
            &RecordPayment {
                invoice_id: settled.id,
                amount: settled.total_amount,
                currency: settled.currency.clone(),
                kind: PaymentKind::Payment,
                method: request.method.or_else(|| Some("gateway".to_string())),
                gateway_reference: Some(receipt.reference),
            },
        )
        .await?;

    PAYMENT_AMOUNT_TOTAL
        .with_label_values(&[&settled.currency])
        .inc_by(settled.total_amount.to_f64().unwrap_or(0.0));
    DOCUMENTS_TOTAL.with_label_values(&["invoice", "paid"]).inc();

    Ok(Json(invoice_response(&state, settled).await?))
}

/// Manually mark an invoice paid (payment arrived out of band).
/// Idempotent for invoices that are already paid.
pub async fn mark_invoice_paid(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(BILLING_ROLES)?;
    let company_id = user.company_id()?;

    let invoice = state
        .db
        .get_invoice(company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if invoice.is_settled() {
        return Ok(Json(invoice_response(&state, invoice).await?));
    }

    let settled = state
        .db
        .set_invoice_paid(company_id, invoice_id)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Cannot mark an invoice with status '{}' as paid",
                invoice.status
            ))
        })?;

    state
        .db
        .insert_payment(
            company_id,
            &RecordPayment {
                invoice_id: settled.id,
                amount: settled.total_amount,
                currency: settled.currency.clone(),
                kind: PaymentKind::Payment,
                method: Some("manual".to_string()),
                gateway_reference: None,
            },
        )
        .await?;

    DOCUMENTS_TOTAL.with_label_values(&["invoice", "paid"]).inc();
    tracing::info!(invoice_id = %settled.id, "Invoice marked paid manually");

    Ok(Json(invoice_response(&state, settled).await?))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(BILLING_ROLES)?;
    let company_id = user.company_id()?;

    let invoice = state
        .db
        .set_invoice_status(company_id, invoice_id, "pending", "cancelled")
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only pending invoices can be cancelled"))
        })?;

    DOCUMENTS_TOTAL
        .with_label_values(&["invoice", "cancelled"])
        .inc();

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// Refund a paid invoice, fully or partially. The refunded total can
/// never exceed the amount paid.
pub async fn refund_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<RefundInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(BILLING_ROLES)?;
    let company_id = user.company_id()?;

    let invoice = state
        .db
        .get_invoice(company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if !invoice.status().is_refundable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Only paid invoices can be refunded; current status is '{}'",
            invoice.status
        )));
    }

    let already_refunded = state.db.sum_refunds(company_id, invoice_id).await?;
    let refundable = invoice.amount_paid - already_refunded;
    let amount = request.amount.unwrap_or(refundable);

    if amount > refundable {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Refund of {} exceeds the refundable balance of {}",
            amount,
            refundable
        )));
    }

    let receipt = state
        .gateway
        .refund(invoice.id, amount, &invoice.currency)
        .await?;

    state
        .db
        .insert_payment(
            company_id,
            &RecordPayment {
                invoice_id: invoice.id,
                amount,
                currency: invoice.currency.clone(),
                kind: PaymentKind::Refund,
                method: None,
                gateway_reference: Some(receipt.reference),
            },
        )
        .await?;

    let fully_refunded = already_refunded + amount >= invoice.amount_paid;
    let invoice = if fully_refunded {
        let refunded = state
            .db
            .set_invoice_status(company_id, invoice_id, "paid", "refunded")
            .await?;
        DOCUMENTS_TOTAL
            .with_label_values(&["invoice", "refunded"])
            .inc();
        refunded.unwrap_or(invoice)
    } else {
        tracing::warn!(
            invoice_id = %invoice.id,
            refunded = %(already_refunded + amount),
            amount_paid = %invoice.amount_paid,
            "Partial refund recorded; invoice remains paid"
        );
        invoice
    };

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// Send a payment reminder for an unpaid invoice.
pub async fn send_reminder(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(BILLING_ROLES)?;
    let company_id = user.company_id()?;

    let invoice = state
        .db
        .get_invoice(company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if !invoice.status().reminder_allowed() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot send a reminder for an invoice with status '{}'",
            invoice.status
        )));
    }

    let customer = state
        .db
        .get_customer(company_id, invoice.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    let channel = state
        .reminder
        .send_reminder(&invoice, &customer, user.user_id())
        .await?;

    Ok(Json(ReminderResponse {
        invoice_id: invoice.id,
        channel: channel.as_str().to_string(),
    }))
}

pub async fn list_invoice_payments(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let payments = state.db.list_payments(company_id, invoice_id).await?;
    Ok(Json(payments))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(BILLING_ROLES)?;
    let company_id = user.company_id()?;

    let deleted = state.db.delete_pending_invoice(company_id, invoice_id).await?;
    if !deleted {
        return match state.db.get_invoice(company_id, invoice_id).await? {
            Some(invoice) => Err(AppError::Conflict(anyhow::anyhow!(
                "Only pending invoices can be deleted; current status is '{}'",
                invoice.status
            ))),
            None => Err(AppError::NotFound(anyhow::anyhow!("Invoice not found"))),
        };
    }

    Ok(StatusCode::NO_CONTENT)
}
