//! User profile model. Role and tenant membership are application-level
//! columns here, not claims minted by the hosted auth provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role assigned to a profile. Every mutating action checks the caller's
/// role against an action-specific allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    CompanyAdmin,
    Manager,
    Dispatcher,
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::CompanyAdmin => "company_admin",
            Role::Manager => "manager",
            Role::Dispatcher => "dispatcher",
            Role::Driver => "driver",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "super_admin" => Role::SuperAdmin,
            "company_admin" => Role::CompanyAdmin,
            "manager" => Role::Manager,
            "dispatcher" => Role::Dispatcher,
            _ => Role::Driver,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn role(&self) -> Role {
        Role::from_string(&self.role)
    }
}

/// Input for creating a profile (invite or onboarding admin).
#[derive(Debug, Clone)]
pub struct CreateProfile {
    pub company_id: Option<Uuid>,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [
            Role::SuperAdmin,
            Role::CompanyAdmin,
            Role::Manager,
            Role::Dispatcher,
            Role::Driver,
        ] {
            assert_eq!(Role::from_string(role.as_str()), role);
        }
    }

    #[test]
    fn unknown_role_defaults_to_driver() {
        assert_eq!(Role::from_string("janitor"), Role::Driver);
    }
}
