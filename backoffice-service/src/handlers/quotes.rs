//! Quote lifecycle: draft -> sent -> accepted/rejected -> converted.
//!
//! Totals are always recomputed server-side; client-sent figures are
//! never stored. Acceptance checks the validity window, and conversion
//! carries the quote's items and totals into the new invoice unchanged.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    into_line_inputs, ConvertQuoteRequest, CreateQuoteRequest, ListQuotesQuery, QuoteResponse,
    UpdateQuoteRequest,
};
use crate::middleware::CurrentUser;
use crate::models::{CreateQuote, QuoteStatus, Role, UpdateQuote};
use crate::services::metrics::DOCUMENTS_TOTAL;
use crate::services::numbering::{self, DocumentKind};
use crate::services::totals;
use crate::startup::AppState;

const WRITE_ROLES: &[Role] = &[Role::CompanyAdmin, Role::Manager, Role::Dispatcher];

async fn quote_response(
    state: &AppState,
    quote: crate::models::Quote,
) -> Result<QuoteResponse, AppError> {
    let items = state.db.get_quote_items(quote.id).await?;
    let effective = quote.effective_status(Utc::now().date_naive());
    Ok(QuoteResponse {
        quote,
        effective_status: effective.as_str().to_string(),
        items,
    })
}

pub async fn create_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateQuoteRequest>,
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
            "Cannot quote an inactive customer"
        )));
    }

    // Billing defaults come from the customer unless overridden.
    let currency = request.currency.unwrap_or_else(|| customer.currency.clone());
    let tax_rate = request.tax_rate.unwrap_or(customer.default_tax_rate);

    let items = into_line_inputs(request.items);
    let computed = totals::compute_totals(&items, tax_rate);

    let quote_number =
        numbering::next_document_number(state.db.pool(), company_id, DocumentKind::Quote).await;

    let quote = state
        .db
        .create_quote(
            company_id,
            user.user_id(),
            &quote_number,
            &CreateQuote {
                customer_id: customer.id,
                currency,
                tax_rate,
                valid_until: request.valid_until,
                notes: request.notes,
                items,
            },
            &computed,
        )
        .await?;

    DOCUMENTS_TOTAL.with_label_values(&["quote", "draft"]).inc();

    Ok((StatusCode::CREATED, Json(quote_response(&state, quote).await?)))
}

pub async fn list_quotes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuotesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let quotes = state
        .db
        .list_quotes(company_id, query.status, query.customer_id)
        .await?;

    let today = Utc::now().date_naive();
    let responses: Vec<_> = quotes
        .into_iter()
        .map(|quote| {
            let effective = quote.effective_status(today);
            serde_json::json!({
                "quote": quote,
                "effective_status": effective.as_str(),
            })
        })
        .collect();

    Ok(Json(responses))
}

pub async fn get_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let quote = state
        .db
        .get_quote(company_id, quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote not found")))?;
    Ok(Json(quote_response(&state, quote).await?))
}

pub async fn update_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(quote_id): Path<Uuid>,
    Json(request): Json<UpdateQuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let existing = state
        .db
        .get_quote(company_id, quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote not found")))?;

    if !existing.status().is_editable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot edit a quote with status '{}'",
            existing.status
        )));
    }

    // Numbers are company-scoped, so a customer change keeps the number.
    if let Some(customer_id) = request.customer_id {
        if customer_id != existing.customer_id {
            let customer = state
                .db
                .get_customer(company_id, customer_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;
            if !customer.is_active {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Cannot quote an inactive customer"
                )));
            }
        }
    }

    let tax_rate = request.tax_rate.unwrap_or(existing.tax_rate);
    let items = request.items.map(into_line_inputs);

    // Totals change whenever the items or the tax rate do. With a new tax
    // rate but untouched items, recompute from the stored lines.
    let computed = match (&items, request.tax_rate) {
        (Some(items), _) => Some(totals::compute_totals(items, tax_rate)),
        (None, Some(_)) => {
            let stored = state.db.get_quote_items(quote_id).await?;
            let inputs: Vec<_> = stored
                .into_iter()
                .map(|item| crate::models::LineInput {
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect();
            Some(totals::compute_totals(&inputs, tax_rate))
        }
        (None, None) => None,
    };

    let quote = state
        .db
        .update_quote(
            company_id,
            quote_id,
            &UpdateQuote {
                customer_id: request.customer_id,
                currency: request.currency,
                tax_rate: request.tax_rate,
                valid_until: request.valid_until,
                notes: request.notes,
                items,
            },
            computed.as_ref(),
        )
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only draft or sent quotes can be edited"))
        })?;

    Ok(Json(quote_response(&state, quote).await?))
}

pub async fn send_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let quote = state
        .db
        .set_quote_status(company_id, quote_id, "draft", "sent")
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only draft quotes can be sent"))
        })?;

    DOCUMENTS_TOTAL.with_label_values(&["quote", "sent"]).inc();
    tracing::info!(quote_id = %quote.id, quote_number = %quote.quote_number, "Quote sent");

    Ok(Json(quote_response(&state, quote).await?))
}

pub async fn accept_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let existing = state
        .db
        .get_quote(company_id, quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote not found")))?;

    let today = Utc::now().date_naive();
    if existing.effective_status(today) == QuoteStatus::Expired {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Quote has expired and can no longer be accepted"
        )));
    }
    if !existing.is_acceptable(today) {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Only sent quotes can be accepted"
        )));
    }

    let quote = state
        .db
        .set_quote_status(company_id, quote_id, "sent", "accepted")
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only sent quotes can be accepted"))
        })?;

    DOCUMENTS_TOTAL
        .with_label_values(&["quote", "accepted"])
        .inc();

    Ok(Json(quote_response(&state, quote).await?))
}

pub async fn reject_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let quote = state
        .db
        .set_quote_status(company_id, quote_id, "sent", "rejected")
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only sent quotes can be rejected"))
        })?;

    DOCUMENTS_TOTAL
        .with_label_values(&["quote", "rejected"])
        .inc();

    Ok(Json(quote_response(&state, quote).await?))
}

/// Convert an accepted quote into a pending invoice. Items and totals
/// carry over verbatim; the due date defaults to the customer's payment
/// terms from today.
pub async fn convert_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(quote_id): Path<Uuid>,
    Json(request): Json<ConvertQuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let quote = state
        .db
        .get_quote(company_id, quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote not found")))?;

    if !quote.status().is_convertible() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Only accepted quotes can be converted; current status is '{}'",
            quote.status
        )));
    }

    let customer = state
        .db
        .get_customer(company_id, quote.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    let due_date = request.due_date.or_else(|| {
        Utc::now()
            .date_naive()
            .checked_add_days(chrono::Days::new(customer.payment_terms_days.max(0) as u64))
    });

    let items = state.db.get_quote_items(quote.id).await?;
    let invoice_number =
        numbering::next_document_number(state.db.pool(), company_id, DocumentKind::Invoice).await;

    let invoice = state
        .db
        .convert_quote_to_invoice(
            &quote,
            &items,
            &invoice_number,
            due_date,
            request.load_id,
            user.user_id(),
        )
        .await?;

    DOCUMENTS_TOTAL
        .with_label_values(&["quote", "converted"])
        .inc();
    DOCUMENTS_TOTAL
        .with_label_values(&["invoice", "pending"])
        .inc();

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(&[Role::CompanyAdmin, Role::Manager])?;
    let company_id = user.company_id()?;

    let deleted = state.db.delete_draft_quote(company_id, quote_id).await?;
    if !deleted {
        // Distinguish missing from non-draft for a useful message.
        return match state.db.get_quote(company_id, quote_id).await? {
            Some(quote) => Err(AppError::Conflict(anyhow::anyhow!(
                "Only draft quotes can be deleted; current status is '{}'",
                quote.status
            ))),
            None => Err(AppError::NotFound(anyhow::anyhow!("Quote not found"))),
        };
    }

    Ok(StatusCode::NO_CONTENT)
}
