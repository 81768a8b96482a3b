//! Company onboarding and self-service settings.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{OnboardCompanyRequest, UpdateCompanyRequest};
use crate::middleware::{AuthClaims, CurrentUser};
use crate::models::{CreateCompany, Role, UpdateCompany};
use crate::startup::AppState;

/// Create a company and its first admin in one step. The caller is a
/// freshly authenticated user with no profile yet.
pub async fn onboard_company(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(request): Json<OnboardCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    if state.db.get_profile(claims.sub).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "This user already belongs to a company"
        )));
    }

    let (company, profile) = state
        .db
        .onboard_company(
            claims.sub,
            &request.admin_email,
            &request.admin_full_name,
            &CreateCompany {
                name: request.company_name,
                address: request.address,
            },
        )
        .await?;

    tracing::info!(
        company_id = %company.id,
        admin_id = %profile.id,
        "Company onboarding completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "company": company, "admin": profile })),
    ))
}

/// The caller's own company.
pub async fn get_company(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let company_id = user.company_id()?;
    let company = state
        .db
        .get_company(company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    Ok(Json(company))
}

pub async fn update_company(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdateCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(&[Role::CompanyAdmin])?;

    let company_id = user.company_id()?;
    let company = state
        .db
        .update_company(
            company_id,
            &UpdateCompany {
                name: request.name,
                address: request.address,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    Ok(Json(company))
}
