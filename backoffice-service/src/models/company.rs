//! Company model: the tenant boundary. Every other entity hangs off a
//! company id and every query filters on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Company status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Active,
    Inactive,
    Suspended,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyStatus::Active => "active",
            CompanyStatus::Inactive => "inactive",
            CompanyStatus::Suspended => "suspended",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "inactive" => CompanyStatus::Inactive,
            "suspended" => CompanyStatus::Suspended,
            _ => CompanyStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn status(&self) -> CompanyStatus {
        CompanyStatus::from_string(&self.status)
    }
}

/// Input for creating a company (onboarding or fleet-application approval).
#[derive(Debug, Clone)]
pub struct CreateCompany {
    pub name: String,
    pub address: Option<String>,
}

/// Input for updating a company's own settings.
#[derive(Debug, Clone, Default)]
pub struct UpdateCompany {
    pub name: Option<String>,
    pub address: Option<String>,
}
