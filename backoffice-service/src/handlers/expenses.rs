//! Expense submission, review and receipt upload.
//!
//! Anyone in the company (drivers included) can file an expense; only
//! managers and admins approve or reject, and only while it is pending.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateExpenseRequest, ListExpensesQuery, UpdateExpenseRequest};
use crate::middleware::CurrentUser;
use crate::models::{CreateExpense, ExpenseStatus, Role, UpdateExpense};
use crate::services::storage;
use crate::startup::AppState;

const REVIEW_ROLES: &[Role] = &[Role::CompanyAdmin, Role::Manager];

pub async fn create_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateExpenseRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let company_id = user.company_id()?;

    if let Some(load_id) = request.load_id {
        state
            .db
            .get_load(company_id, load_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Load not found")))?;
    }

    let expense = state
        .db
        .create_expense(
            company_id,
            user.user_id(),
            &CreateExpense {
                category: request.category,
                description: request.description,
                amount: request.amount,
                currency: request.currency.unwrap_or_else(|| "USD".to_string()),
                load_id: request.load_id,
                vehicle_unit: request.vehicle_unit,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListExpensesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let mut expenses = state.db.list_expenses(company_id, query.status).await?;

    // Drivers see only what they filed.
    if user.role == Role::Driver {
        expenses.retain(|expense| expense.created_by == user.user_id());
    }

    Ok(Json(expenses))
}

pub async fn get_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let expense = state
        .db
        .get_expense(company_id, expense_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Expense not found")))?;

    if user.role == Role::Driver && expense.created_by != user.user_id() {
        return Err(AppError::NotFound(anyhow::anyhow!("Expense not found")));
    }

    Ok(Json(expense))
}

pub async fn update_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(expense_id): Path<Uuid>,
    Json(request): Json<UpdateExpenseRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let company_id = user.company_id()?;

    let existing = state
        .db
        .get_expense(company_id, expense_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Expense not found")))?;

    // The filer can amend their own pending expense; reviewers can amend any.
    if existing.created_by != user.user_id() {
        user.require_role(REVIEW_ROLES)?;
    }
    if !existing.status().is_reviewable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot edit an expense with status '{}'",
            existing.status
        )));
    }

    let expense = state
        .db
        .update_expense(
            company_id,
            expense_id,
            &UpdateExpense {
                category: request.category,
                description: request.description,
                amount: request.amount,
                currency: request.currency,
                load_id: request.load_id,
                vehicle_unit: request.vehicle_unit,
            },
        )
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only pending expenses can be edited"))
        })?;

    Ok(Json(expense))
}

pub async fn approve_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    review_expense(state, user, expense_id, ExpenseStatus::Approved).await
}

pub async fn reject_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    review_expense(state, user, expense_id, ExpenseStatus::Rejected).await
}

async fn review_expense(
    state: AppState,
    user: CurrentUser,
    expense_id: Uuid,
    verdict: ExpenseStatus,
) -> Result<Json<crate::models::Expense>, AppError> {
    user.require_role(REVIEW_ROLES)?;
    let company_id = user.company_id()?;

    let expense = state
        .db
        .set_expense_status(company_id, expense_id, verdict.as_str())
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Only pending expenses can be approved or rejected"
            ))
        })?;

    tracing::info!(
        expense_id = %expense.id,
        verdict = verdict.as_str(),
        reviewed_by = %user.user_id(),
        "Expense reviewed"
    );

    Ok(Json(expense))
}

/// Attach a receipt image or PDF to an expense.
pub async fn upload_receipt(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(expense_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;

    let existing = state
        .db
        .get_expense(company_id, expense_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Expense not found")))?;

    if existing.created_by != user.user_id() {
        user.require_role(REVIEW_ROLES)?;
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read upload: {}", e)))?
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;

    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e)))?;

    storage::validate_receipt(&content_type, data.len(), state.max_receipt_bytes)?;

    let path = state
        .storage
        .store_receipt(company_id, expense_id, &content_type, &data)
        .await?;

    let expense = state
        .db
        .set_expense_receipt(company_id, expense_id, &path)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Expense not found")))?;

    Ok(Json(expense))
}
