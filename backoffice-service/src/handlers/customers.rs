//! Customer management.
//!
//! Customers are never hard-deleted: removal deactivates the row, and
//! even that is blocked while the customer has loads in flight.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateCustomerRequest, ListCustomersQuery, UpdateCustomerRequest};
use crate::middleware::CurrentUser;
use crate::models::{CreateCustomer, Role, UpdateCustomer};
use crate::startup::AppState;

const WRITE_ROLES: &[Role] = &[Role::CompanyAdmin, Role::Manager, Role::Dispatcher];

pub async fn create_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let customer = state
        .db
        .create_customer(
            company_id,
            &CreateCustomer {
                name: request.name,
                email: request.email,
                phone: request.phone,
                billing_address: request.billing_address,
                currency: request.currency.unwrap_or_else(|| "USD".to_string()),
                default_tax_rate: request.default_tax_rate.unwrap_or_default(),
                payment_terms_days: request.payment_terms_days.unwrap_or(30),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListCustomersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let customers = state
        .db
        .list_customers(company_id, query.include_inactive)
        .await?;
    Ok(Json(customers))
}

pub async fn get_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let customer = state
        .db
        .get_customer(company_id, customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;
    Ok(Json(customer))
}

pub async fn update_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(WRITE_ROLES)?;
    let company_id = user.company_id()?;

    let customer = state
        .db
        .update_customer(
            company_id,
            customer_id,
            &UpdateCustomer {
                name: request.name,
                email: request.email,
                phone: request.phone,
                billing_address: request.billing_address,
                currency: request.currency,
                default_tax_rate: request.default_tax_rate,
                payment_terms_days: request.payment_terms_days,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

/// A customer with loads still pending, assigned or in transit cannot be
/// deactivated; those loads need a reachable customer record.
fn ensure_no_active_loads(blocking: i64) -> Result<(), AppError> {
    if blocking > 0 {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot remove customer with {} active load(s); deliver or cancel them first",
            blocking
        )));
    }
    Ok(())
}

/// Deactivate a customer. Blocked while the customer has loads that are
/// pending, assigned or in transit.
pub async fn deactivate_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(&[Role::CompanyAdmin, Role::Manager])?;
    let company_id = user.company_id()?;

    let blocking = state
        .db
        .count_blocking_loads(company_id, customer_id)
        .await?;
    ensure_no_active_loads(blocking)?;

    let customer = state
        .db
        .set_customer_active(company_id, customer_id, false)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    tracing::info!(customer_id = %customer.id, "Customer deactivated");

    Ok(Json(customer))
}

pub async fn reactivate_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(&[Role::CompanyAdmin, Role::Manager])?;
    let company_id = user.company_id()?;

    let customer = state
        .db
        .set_customer_active(company_id, customer_id, true)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deactivation_passes_with_no_loads_in_flight() {
        assert!(ensure_no_active_loads(0).is_ok());
    }

    #[test]
    fn deactivation_blocked_while_loads_are_in_flight() {
        let err = ensure_no_active_loads(3).unwrap_err();
        match err {
            AppError::Conflict(e) => {
                assert_eq!(
                    e.to_string(),
                    "Cannot remove customer with 3 active load(s); deliver or cancel them first"
                )
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
