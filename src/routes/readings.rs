use axum::{
    extract::{Path, Query, State},
    http::header::{self, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::backend::models::SensorNumber;
use crate::common::AppState;
use crate::dashboard::{recent_readings, sensor_series, NormalizedSeries, SeriesPoint, SeriesView};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeriesFormat {
    Json,
    Csv,
}

fn determine_format(query_format: Option<&str>, headers: &HeaderMap) -> AppResult<SeriesFormat> {
    // Query parameter takes precedence
    if let Some(format) = query_format {
        return match format.to_lowercase().as_str() {
            "json" => Ok(SeriesFormat::Json),
            "csv" => Ok(SeriesFormat::Csv),
            other => Err(AppError::BadRequest(format!(
                "Unsupported format '{other}' (expected json or csv)"
            ))),
        };
    }

    if let Some(accept) = headers.get(header::ACCEPT)
        && let Ok(accept_str) = accept.to_str()
        && accept_str.contains("text/csv")
    {
        return Ok(SeriesFormat::Csv);
    }

    Ok(SeriesFormat::Json)
}

fn validate_limit(limit: Option<u32>) -> AppResult<Option<u32>> {
    match limit {
        Some(0) => Err(AppError::BadRequest("limit must be at least 1".to_string())),
        other => Ok(other),
    }
}

/// Render series points as `timestamp,moisture` CSV, one row per point.
pub fn series_csv(points: &[SeriesPoint]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(["timestamp", "moisture"])
        .map_err(|e| AppError::Internal(e.to_string()))?;

    for point in points {
        let moisture = point.moisture.to_string();
        writer
            .write_record([point.timestamp.as_str(), moisture.as_str()])
            .map_err(|e| AppError::Internal(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn build_csv_response(points: &[SeriesPoint], filename: &str) -> AppResult<Response> {
    let body = series_csv(points)?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"))
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(axum::body::Body::from(body))
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SeriesQuery {
    /// Most recent N readings (omit for the full history)
    pub limit: Option<u32>,
    /// Response format: json (default) or csv
    pub format: Option<String>,
}

/// Reading history of one sensor
///
/// Readings are most-recent-first. Timestamps are rendered for display;
/// unparsable ones show as "Invalid Date", missing ones as "N/A".
#[utoipa::path(
    get,
    path = "/api/devices/{device_id}/sensors/{sensor_number}/readings",
    params(
        ("device_id" = String, Path, description = "External device identifier"),
        ("sensor_number" = i64, Path, description = "Sensor number on that device"),
        SeriesQuery
    ),
    responses(
        (status = 200, description = "Readings retrieved successfully", body = SeriesView),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Unknown device or sensor"),
        (status = 502, description = "Backend unavailable"),
    ),
    tag = "readings"
)]
pub async fn get_sensor_readings(
    State(state): State<AppState>,
    Path((device_id, sensor_number)): Path<(String, i64)>,
    Query(query): Query<SeriesQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let format = determine_format(query.format.as_deref(), &headers)?;
    let limit = validate_limit(query.limit)?;

    let series = sensor_series(&state, &device_id, SensorNumber(sensor_number), limit).await?;

    match format {
        SeriesFormat::Csv => {
            let filename: String = format!("{device_id}-{sensor_number}.csv")
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect();
            build_csv_response(&series.points, &filename)
        }
        SeriesFormat::Json => Ok(Json(series).into_response()),
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentReadingsQuery {
    /// Most recent N readings across all sensors
    pub limit: Option<u32>,
}

/// Recent readings across all sensors
#[utoipa::path(
    get,
    path = "/api/readings",
    params(RecentReadingsQuery),
    responses(
        (status = 200, description = "Readings retrieved successfully", body = NormalizedSeries),
        (status = 400, description = "Invalid query parameters"),
        (status = 502, description = "Backend unavailable"),
    ),
    tag = "readings"
)]
pub async fn list_recent_readings(
    State(state): State<AppState>,
    Query(query): Query<RecentReadingsQuery>,
) -> AppResult<Json<NormalizedSeries>> {
    let limit = validate_limit(query.limit)?;
    Ok(Json(recent_readings(&state, limit).await?))
}
