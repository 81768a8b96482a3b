//! Load (shipment) model and lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Load status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Pending,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Pending => "pending",
            LoadStatus::Assigned => "assigned",
            LoadStatus::InTransit => "in_transit",
            LoadStatus::Delivered => "delivered",
            LoadStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "assigned" => LoadStatus::Assigned,
            "in_transit" => LoadStatus::InTransit,
            "delivered" => LoadStatus::Delivered,
            "cancelled" => LoadStatus::Cancelled,
            _ => LoadStatus::Pending,
        }
    }

    /// Explicit transition table. `delivered` is terminal; a cancelled load
    /// can be reopened to pending.
    pub fn can_transition_to(self, next: LoadStatus) -> bool {
        matches!(
            (self, next),
            (LoadStatus::Pending, LoadStatus::Assigned)
                | (LoadStatus::Pending, LoadStatus::Cancelled)
                | (LoadStatus::Assigned, LoadStatus::InTransit)
                | (LoadStatus::Assigned, LoadStatus::Pending)
                | (LoadStatus::Assigned, LoadStatus::Cancelled)
                | (LoadStatus::InTransit, LoadStatus::Delivered)
                | (LoadStatus::InTransit, LoadStatus::Cancelled)
                | (LoadStatus::Cancelled, LoadStatus::Pending)
        )
    }

    /// Editing is restricted to loads not yet on the road.
    pub fn is_editable(self) -> bool {
        matches!(self, LoadStatus::Pending | LoadStatus::Assigned)
    }

    pub fn is_deletable(self) -> bool {
        matches!(self, LoadStatus::Pending)
    }

    /// Statuses that block deactivating the customer the load belongs to.
    pub fn blocks_customer_removal(self) -> bool {
        matches!(
            self,
            LoadStatus::Pending | LoadStatus::Assigned | LoadStatus::InTransit
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Load {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub load_number: String,
    pub origin: String,
    pub destination: String,
    pub pickup_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub driver_id: Option<Uuid>,
    pub vehicle_unit: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Load {
    pub fn status(&self) -> LoadStatus {
        LoadStatus::from_string(&self.status)
    }
}

/// Input for creating a load.
#[derive(Debug, Clone)]
pub struct CreateLoad {
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub origin: String,
    pub destination: String,
    pub pickup_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Input for updating a load (pending or assigned only).
#[derive(Debug, Clone, Default)]
pub struct UpdateLoad {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_is_terminal() {
        for next in [
            LoadStatus::Pending,
            LoadStatus::Assigned,
            LoadStatus::InTransit,
            LoadStatus::Cancelled,
        ] {
            assert!(!LoadStatus::Delivered.can_transition_to(next));
        }
    }

    #[test]
    fn cancelled_can_reopen_to_pending_only() {
        assert!(LoadStatus::Cancelled.can_transition_to(LoadStatus::Pending));
        assert!(!LoadStatus::Cancelled.can_transition_to(LoadStatus::Assigned));
        assert!(!LoadStatus::Cancelled.can_transition_to(LoadStatus::Delivered));
    }

    #[test]
    fn assigned_can_go_back_to_pending() {
        assert!(LoadStatus::Assigned.can_transition_to(LoadStatus::Pending));
        assert!(LoadStatus::Assigned.can_transition_to(LoadStatus::InTransit));
    }

    #[test]
    fn in_transit_cannot_be_unassigned() {
        assert!(!LoadStatus::InTransit.can_transition_to(LoadStatus::Pending));
        assert!(!LoadStatus::InTransit.can_transition_to(LoadStatus::Assigned));
        assert!(LoadStatus::InTransit.can_transition_to(LoadStatus::Delivered));
    }

    #[test]
    fn active_statuses_block_customer_removal() {
        assert!(LoadStatus::Pending.blocks_customer_removal());
        assert!(LoadStatus::Assigned.blocks_customer_removal());
        assert!(LoadStatus::InTransit.blocks_customer_removal());
        assert!(!LoadStatus::Delivered.blocks_customer_removal());
        assert!(!LoadStatus::Cancelled.blocks_customer_removal());
    }
}
