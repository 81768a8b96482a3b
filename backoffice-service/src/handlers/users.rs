//! Team management within a company.
//!
//! Role changes never touch super admins, and nobody can delete their
//! own account.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{InviteUserRequest, UpdateUserRoleRequest};
use crate::middleware::CurrentUser;
use crate::models::{CreateProfile, Role};
use crate::startup::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(&[Role::CompanyAdmin, Role::Manager])?;
    let company_id = user.company_id()?;
    let profiles = state.db.list_profiles(company_id).await?;
    Ok(Json(profiles))
}

/// Add a teammate. The profile is created immediately; the invitee signs
/// in through the identity provider with the same email.
pub async fn invite_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<InviteUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    user.require_role(&[Role::CompanyAdmin])?;
    let company_id = user.company_id()?;

    let role = Role::from_string(&request.role);
    if role == Role::SuperAdmin {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Cannot grant the super admin role"
        )));
    }

    let profile = state
        .db
        .create_profile(&CreateProfile {
            company_id: Some(company_id),
            email: request.email,
            full_name: request.full_name,
            role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(&[Role::CompanyAdmin])?;
    let company_id = user.company_id()?;

    let target = state
        .db
        .get_company_profile(company_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    if target.role() == Role::SuperAdmin {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Cannot change a super admin's role"
        )));
    }

    let role = Role::from_string(&request.role);
    if role == Role::SuperAdmin {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Cannot grant the super admin role"
        )));
    }

    let profile = state
        .db
        .update_profile_role(company_id, user_id, role)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    tracing::info!(
        target = %user_id,
        role = %profile.role,
        changed_by = %user.user_id(),
        "User role updated"
    );

    Ok(Json(profile))
}

/// Self-deletion would lock the company out of its own admin account.
fn forbid_self_deletion(actor: &CurrentUser, target: Uuid) -> Result<(), AppError> {
    if target == actor.user_id() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Cannot delete your own account"
        )));
    }
    Ok(())
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(&[Role::CompanyAdmin])?;
    let company_id = user.company_id()?;

    forbid_self_deletion(&user, user_id)?;

    let deleted = state.db.delete_profile(company_id, user_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;
    use chrono::Utc;

    fn admin_user() -> CurrentUser {
        CurrentUser {
            profile: Profile {
                id: Uuid::new_v4(),
                company_id: Some(Uuid::new_v4()),
                email: "admin@example.com".to_string(),
                full_name: "Admin".to_string(),
                role: Role::CompanyAdmin.as_str().to_string(),
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            role: Role::CompanyAdmin,
        }
    }

    #[test]
    fn deleting_a_teammate_is_allowed() {
        let actor = admin_user();
        assert!(forbid_self_deletion(&actor, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn deleting_your_own_account_is_rejected() {
        let actor = admin_user();
        let err = forbid_self_deletion(&actor, actor.user_id()).unwrap_err();
        match err {
            AppError::BadRequest(e) => {
                assert_eq!(e.to_string(), "Cannot delete your own account")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
