//! Request authentication and authorization.
//!
//! Tokens are issued by the identity provider; this service only
//! validates them. The `CurrentUser` extractor resolves the bearer token
//! to a profile row, so a revoked (deactivated) user is rejected on the
//! next request even when the token is still within its lifetime.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{CompanyStatus, Profile, Role};
use crate::startup::AppState;

/// JWT claims accepted from the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Decode and validate a bearer token.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Issue a token for the given user. Used by tests and local tooling;
/// production tokens come from the identity provider.
pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, AppError> {
    let token = encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Bearer claims without a profile lookup. Used only by onboarding,
/// where the caller does not have a profile row yet.
#[derive(Debug, Clone)]
pub struct AuthClaims(pub Claims);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthClaims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!(
                    "Missing or invalid Authorization header"
                ))
            })?;

        Ok(AuthClaims(decode_token(token, &state.jwt_secret)?))
    }
}

/// The authenticated caller, resolved to a live profile row.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub profile: Profile,
    pub role: Role,
}

impl CurrentUser {
    pub fn user_id(&self) -> Uuid {
        self.profile.id
    }

    /// The caller's company scope. Super admins have no company of their
    /// own; endpoints that need one reject them here.
    pub fn company_id(&self) -> Result<Uuid, AppError> {
        self.profile.company_id.ok_or_else(|| {
            AppError::Forbidden(anyhow::anyhow!(
                "This operation requires a company account"
            ))
        })
    }

    /// Role gate. Super admins pass every gate.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if self.role == Role::SuperAdmin || allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Insufficient permissions"
            )))
        }
    }

    pub fn require_super_admin(&self) -> Result<(), AppError> {
        if self.role == Role::SuperAdmin {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Super admin access required"
            )))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!(
                    "Missing or invalid Authorization header"
                ))
            })?;

        let claims = decode_token(token, &state.jwt_secret)?;

        let profile = state
            .db
            .get_profile(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unknown user")))?;

        if !profile.is_active {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "User account is deactivated"
            )));
        }

        if let Some(company_id) = profile.company_id {
            let company = state
                .db
                .get_company(company_id)
                .await?
                .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unknown company")))?;
            if company.status() == CompanyStatus::Suspended {
                return Err(AppError::Forbidden(anyhow::anyhow!(
                    "Company account is suspended"
                )));
            }
        }

        let role = profile.role();
        Ok(CurrentUser { profile, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims_for(sub: Uuid) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub,
            email: "driver@example.com".to_string(),
            iat: now,
            exp: now + 3600,
        }
    }

    #[test]
    fn token_round_trips_through_encode_and_decode() {
        let sub = Uuid::new_v4();
        let token = encode_token(&claims_for(sub), "test-secret").unwrap();
        let decoded = decode_token(&token, "test-secret").unwrap();
        assert_eq!(decoded.sub, sub);
        assert_eq!(decoded.email, "driver@example.com");
    }

    #[test]
    fn decode_rejects_wrong_secret() {
        let token = encode_token(&claims_for(Uuid::new_v4()), "test-secret").unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn decode_rejects_expired_token() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "x@example.com".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode_token(&claims, "test-secret").unwrap();
        assert!(decode_token(&token, "test-secret").is_err());
    }
}
