//! Load dispatch: create, assign a driver, move through the status
//! machine, deliver.
//!
//! Drivers see only their own loads and may do exactly one thing with
//! them: mark an in-transit load delivered.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    AssignLoadRequest, CreateLoadRequest, ListLoadsQuery, SetLoadStatusRequest, UpdateLoadRequest,
};
use crate::middleware::CurrentUser;
use crate::models::{CreateLoad, Load, LoadStatus, Role, UpdateLoad};
use crate::services::metrics::DOCUMENTS_TOTAL;
use crate::services::numbering::{self, DocumentKind};
use crate::startup::AppState;

const DISPATCH_ROLES: &[Role] = &[Role::CompanyAdmin, Role::Manager, Role::Dispatcher];

fn driver_owns(user: &CurrentUser, load: &Load) -> bool {
    load.driver_id == Some(user.user_id())
}

pub async fn create_load(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateLoadRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(DISPATCH_ROLES)?;
    let company_id = user.company_id()?;

    let customer = state
        .db
        .get_customer(company_id, request.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;
    if !customer.is_active {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot create a load for an inactive customer"
        )));
    }

    let load_number =
        numbering::next_document_number(state.db.pool(), company_id, DocumentKind::Load).await;

    let load = state
        .db
        .create_load(
            company_id,
            user.user_id(),
            &load_number,
            &CreateLoad {
                customer_id: customer.id,
                quote_id: request.quote_id,
                origin: request.origin,
                destination: request.destination,
                pickup_date: request.pickup_date,
                delivery_date: request.delivery_date,
                notes: request.notes,
            },
        )
        .await?;

    DOCUMENTS_TOTAL.with_label_values(&["load", "pending"]).inc();

    Ok((StatusCode::CREATED, Json(load)))
}

pub async fn list_loads(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListLoadsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;

    // Drivers are pinned to their own loads regardless of the filter.
    let driver_filter = if user.role == Role::Driver {
        Some(user.user_id())
    } else {
        query.driver_id
    };

    let loads = state
        .db
        .list_loads(company_id, query.status, driver_filter)
        .await?;
    Ok(Json(loads))
}

pub async fn get_load(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(load_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let load = state
        .db
        .get_load(company_id, load_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Load not found")))?;

    if user.role == Role::Driver && !driver_owns(&user, &load) {
        return Err(AppError::NotFound(anyhow::anyhow!("Load not found")));
    }

    Ok(Json(load))
}

pub async fn update_load(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(load_id): Path<Uuid>,
    Json(request): Json<UpdateLoadRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(DISPATCH_ROLES)?;
    let company_id = user.company_id()?;

    let existing = state
        .db
        .get_load(company_id, load_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Load not found")))?;

    if !existing.status().is_editable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot edit a load with status '{}'",
            existing.status
        )));
    }

    let load = state
        .db
        .update_load(
            company_id,
            load_id,
            &UpdateLoad {
                origin: request.origin,
                destination: request.destination,
                pickup_date: request.pickup_date,
                delivery_date: request.delivery_date,
                notes: request.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Load not found")))?;

    Ok(Json(load))
}

/// Assign a driver (and optionally a vehicle unit) to a load.
pub async fn assign_load(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(load_id): Path<Uuid>,
    Json(request): Json<AssignLoadRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(DISPATCH_ROLES)?;
    let company_id = user.company_id()?;

    let driver = state
        .db
        .get_company_profile(company_id, request.driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Driver not found")))?;
    if driver.role() != Role::Driver {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Assignee '{}' is not a driver",
            driver.full_name
        )));
    }
    if !driver.is_active {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot assign a deactivated driver"
        )));
    }

    let load = state
        .db
        .assign_load(
            company_id,
            load_id,
            request.driver_id,
            request.vehicle_unit.as_deref(),
        )
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Loads can only be assigned while pending or assigned"
            ))
        })?;

    DOCUMENTS_TOTAL
        .with_label_values(&["load", "assigned"])
        .inc();
    tracing::info!(
        load_id = %load.id,
        driver_id = %request.driver_id,
        "Load assigned"
    );

    Ok(Json(load))
}

/// Move a load through its status machine. Dispatch roles may perform
/// any legal transition; drivers may only deliver their own load.
pub async fn set_load_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(load_id): Path<Uuid>,
    Json(request): Json<SetLoadStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;

    let existing = state
        .db
        .get_load(company_id, load_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Load not found")))?;

    let next = LoadStatus::from_string(&request.status);
    if next.as_str() != request.status {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown load status '{}'",
            request.status
        )));
    }

    if user.role == Role::Driver {
        if !driver_owns(&user, &existing) {
            return Err(AppError::NotFound(anyhow::anyhow!("Load not found")));
        }
        if next != LoadStatus::Delivered {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Drivers can only mark their load as delivered"
            )));
        }
    } else {
        user.require_role(DISPATCH_ROLES)?;
    }

    let current = existing.status();
    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot move load from '{}' to '{}'",
            current.as_str(),
            next.as_str()
        )));
    }

    // A load cannot roll without a driver behind the wheel.
    if next == LoadStatus::InTransit && existing.driver_id.is_none() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot start transit without an assigned driver"
        )));
    }

    let load = state
        .db
        .set_load_status(company_id, load_id, current.as_str(), next.as_str())
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Load status changed concurrently; retry"))
        })?;

    DOCUMENTS_TOTAL
        .with_label_values(&["load", next.as_str()])
        .inc();
    tracing::info!(
        load_id = %load.id,
        from = current.as_str(),
        to = next.as_str(),
        changed_by = %user.user_id(),
        "Load status changed"
    );

    Ok(Json(load))
}

pub async fn delete_load(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(load_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(&[Role::CompanyAdmin, Role::Manager])?;
    let company_id = user.company_id()?;

    let deleted = state.db.delete_pending_load(company_id, load_id).await?;
    if !deleted {
        return match state.db.get_load(company_id, load_id).await? {
            Some(load) => Err(AppError::Conflict(anyhow::anyhow!(
                "Only pending loads can be deleted; current status is '{}'",
                load.status
            ))),
            None => Err(AppError::NotFound(anyhow::anyhow!("Load not found"))),
        };
    }

    Ok(StatusCode::NO_CONTENT)
}
