use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::backend::models::{DeviceId, Sensor, SensorCreate, SensorId, Threshold, ThresholdUpdate};
use crate::common::AppState;
use crate::error::AppResult;

use super::types::SensorsQuery;

/// List all sensors
#[utoipa::path(
    get,
    path = "/api/sensors",
    params(SensorsQuery),
    responses(
        (status = 200, description = "Sensors retrieved successfully", body = Vec<Sensor>),
    ),
    tag = "sensors"
)]
pub async fn list_sensors(
    State(state): State<AppState>,
    Query(query): Query<SensorsQuery>,
) -> AppResult<Json<Vec<Sensor>>> {
    let mut sensors = state.backend.list_sensors().await?;

    if let Some(device) = query.device.map(DeviceId) {
        sensors.retain(|s| s.device == device);
    }

    if query.missing_threshold {
        sensors.retain(|s| s.threshold.is_none());
    }

    sensors.sort_by_key(|s| (s.device, s.number));
    Ok(Json(sensors))
}

/// Register a sensor on a device
#[utoipa::path(
    post,
    path = "/api/sensors",
    request_body = SensorCreate,
    responses(
        (status = 201, description = "Sensor registered", body = Sensor),
        (status = 400, description = "Sensor number already taken on that device"),
    ),
    tag = "sensors"
)]
pub async fn create_sensor(
    State(state): State<AppState>,
    Json(payload): Json<SensorCreate>,
) -> AppResult<(StatusCode, Json<Sensor>)> {
    let sensor = state.backend.create_sensor(&payload).await?;
    state.invalidate_directory().await;

    tracing::info!(sensor_id = %sensor.id, device = %sensor.device, number = %sensor.number, "sensor_registered");
    Ok((StatusCode::CREATED, Json(sensor)))
}

/// Get the threshold of a sensor
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}/threshold",
    params(
        ("sensor_id" = i64, Path, description = "Global sensor id"),
    ),
    responses(
        (status = 200, description = "Threshold retrieved successfully", body = Threshold),
        (status = 404, description = "Sensor or threshold not found"),
    ),
    tag = "sensors"
)]
pub async fn get_threshold(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
) -> AppResult<Json<Threshold>> {
    let threshold = state.backend.get_threshold(SensorId(sensor_id)).await?;
    Ok(Json(threshold))
}

/// Set the threshold of a sensor
///
/// Either bound may be omitted, meaning "no bound".
#[utoipa::path(
    put,
    path = "/api/sensors/{sensor_id}/threshold",
    params(
        ("sensor_id" = i64, Path, description = "Global sensor id"),
    ),
    request_body = ThresholdUpdate,
    responses(
        (status = 200, description = "Threshold stored", body = Threshold),
        (status = 400, description = "Inconsistent bounds"),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "sensors"
)]
pub async fn put_threshold(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
    Json(payload): Json<ThresholdUpdate>,
) -> AppResult<Json<Threshold>> {
    let threshold = state
        .backend
        .set_threshold(SensorId(sensor_id), &payload)
        .await?;
    state.invalidate_directory().await;

    tracing::info!(
        sensor_id,
        min = ?threshold.min_moisture,
        max = ?threshold.max_moisture,
        "threshold_updated"
    );
    Ok(Json(threshold))
}
