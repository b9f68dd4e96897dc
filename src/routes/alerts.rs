use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::backend::models::{Alert, AlertId};
use crate::common::AppState;
use crate::error::{AppError, AppResult};

const MAX_PAGE_SIZE: u32 = 1000;

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AlertsQuery {
    /// Number of alerts to skip
    #[serde(default)]
    pub skip: u32,
    /// Page size (max 1000)
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Only alerts not yet acknowledged
    #[serde(default)]
    pub unread_only: bool,
}

/// List alerts
#[utoipa::path(
    get,
    path = "/api/alerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Alerts retrieved successfully", body = Vec<Alert>),
        (status = 400, description = "Invalid paging parameters"),
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> AppResult<Json<Vec<Alert>>> {
    if query.limit == 0 || query.limit > MAX_PAGE_SIZE {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let mut alerts = state.backend.list_alerts(query.skip, query.limit).await?;
    if query.unread_only {
        alerts.retain(|a| !a.read);
    }

    Ok(Json(alerts))
}

/// Acknowledge an alert
#[utoipa::path(
    put,
    path = "/api/alerts/{alert_id}/read",
    params(
        ("alert_id" = i64, Path, description = "Alert id"),
    ),
    responses(
        (status = 200, description = "Alert marked as read", body = Alert),
        (status = 404, description = "Alert not found"),
    ),
    tag = "alerts"
)]
pub async fn mark_alert_read(
    State(state): State<AppState>,
    Path(alert_id): Path<i64>,
) -> AppResult<Json<Alert>> {
    let alert = state.backend.mark_alert_read(AlertId(alert_id)).await?;
    tracing::info!(alert_id, sensor_id = %alert.sensor_id, "alert_acknowledged");
    Ok(Json(alert))
}
