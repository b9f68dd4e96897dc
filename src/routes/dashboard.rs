use axum::{extract::State, Json};

use crate::common::AppState;
use crate::dashboard::{build_dashboard, DashboardView};
use crate::error::AppResult;

/// Dashboard overview
///
/// Every device with its sensors, each sensor's most recent reading and
/// threshold state, plus the most recent alerts. Sensors whose lookup failed
/// are listed under `failures` instead of failing the whole page.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard assembled", body = DashboardView),
        (status = 502, description = "Device directory unavailable"),
        (status = 503, description = "Too many concurrent dashboard requests"),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardView>> {
    let _permit = state.try_dashboard_permit()?;
    let view = build_dashboard(&state).await?;

    tracing::debug!(
        devices = view.devices.len(),
        failures = view.failures.len(),
        unread_recent_alerts = view.unread_recent_alerts,
        "dashboard_built"
    );

    Ok(Json(view))
}
