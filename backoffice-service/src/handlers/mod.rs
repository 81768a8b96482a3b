pub mod admin;
pub mod companies;
pub mod customers;
pub mod expenses;
pub mod invoices;
pub mod loads;
pub mod quotes;
pub mod users;

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::services::metrics;
use crate::startup::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "backoffice-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness: fails while the database is unreachable.
pub async fn readiness_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.db.health_check().await?;
    Ok(Json(json!({ "status": "ready" })))
}

pub async fn metrics_handler() -> impl IntoResponse {
    metrics::get_metrics()
}
