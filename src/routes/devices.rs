use axum::{extract::State, http::StatusCode, Json};

use crate::backend::models::{Device, DeviceCreate};
use crate::common::AppState;
use crate::error::AppResult;

/// List registered devices with their sensors
#[utoipa::path(
    get,
    path = "/api/devices",
    responses(
        (status = 200, description = "Devices retrieved successfully", body = Vec<Device>),
        (status = 502, description = "Backend unavailable"),
    ),
    tag = "devices"
)]
pub async fn list_devices(State(state): State<AppState>) -> AppResult<Json<Vec<Device>>> {
    let devices = state.devices().await?;
    Ok(Json(devices.as_ref().clone()))
}

/// Register a device
#[utoipa::path(
    post,
    path = "/api/devices",
    request_body = DeviceCreate,
    responses(
        (status = 201, description = "Device registered", body = Device),
        (status = 400, description = "Invalid or already registered"),
    ),
    tag = "devices"
)]
pub async fn create_device(
    State(state): State<AppState>,
    Json(payload): Json<DeviceCreate>,
) -> AppResult<(StatusCode, Json<Device>)> {
    let device = state.backend.create_device(&payload).await?;
    state.invalidate_directory().await;

    tracing::info!(device = %device.hardware_id, id = %device.id, "device_registered");
    Ok((StatusCode::CREATED, Json(device)))
}
