//! Super-admin console and reporting.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::CompanyDashboard;
use crate::middleware::CurrentUser;
use crate::models::{CompanyStatus, Role};
use crate::startup::AppState;

/// Platform-wide company listing with user and load counts.
pub async fn list_companies(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_super_admin()?;
    let companies = state.db.list_company_accounts().await?;
    Ok(Json(companies))
}

pub async fn suspend_company(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_super_admin()?;

    let company = state
        .db
        .set_company_status(company_id, CompanyStatus::Suspended)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    tracing::warn!(company_id = %company.id, "Company suspended");

    Ok(Json(company))
}

pub async fn reactivate_company(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_super_admin()?;

    let company = state
        .db
        .set_company_status(company_id, CompanyStatus::Active)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    tracing::info!(company_id = %company.id, "Company reactivated");

    Ok(Json(company))
}

/// Company-level dashboard: load counts per status plus paid and
/// outstanding revenue.
pub async fn company_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(&[Role::CompanyAdmin, Role::Manager, Role::Dispatcher])?;
    let company_id = user.company_id()?;

    let counts = state.db.count_loads_by_status(company_id).await?;
    let revenue_paid = state.db.sum_invoice_totals(company_id, "paid").await?;
    let revenue_outstanding = state.db.sum_invoice_totals(company_id, "pending").await?;

    let loads_by_status = counts
        .into_iter()
        .map(|row| (row.status, row.count))
        .collect();

    Ok(Json(CompanyDashboard {
        loads_by_status,
        revenue_paid,
        revenue_outstanding,
    }))
}
