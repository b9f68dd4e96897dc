use serde::Serialize;
use utoipa::ToSchema;

use crate::backend::models::{Alert, Device, DeviceId, Reading, Sensor, SensorId, SensorNumber, Threshold};
use crate::backend::{ReadingQuery, ReadingStore};
use crate::common::AppState;
use crate::dashboard::normalizer::{
    display_timestamp, normalize_series, DisplayFormat, NormalizedSeries, SeriesPoint,
};
use crate::dashboard::projector::{project_latest, LatestReadings};
use crate::error::AppResult;

/// Where the latest reading sits relative to the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdState {
    Below,
    Within,
    Above,
    /// No usable reading, or no threshold configured
    Unknown,
}

impl ThresholdState {
    pub fn evaluate(reading: Option<&Reading>, threshold: Option<&Threshold>) -> Self {
        let (Some(value), Some(threshold)) =
            (reading.and_then(|r| r.moisture.value()), threshold)
        else {
            return Self::Unknown;
        };

        if threshold.min_moisture.is_some_and(|min| value < min) {
            Self::Below
        } else if threshold.max_moisture.is_some_and(|max| value > max) {
            Self::Above
        } else if threshold.min_moisture.is_none() && threshold.max_moisture.is_none() {
            Self::Unknown
        } else {
            Self::Within
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SensorCard {
    pub id: SensorId,
    pub number: SensorNumber,
    pub label: String,
    /// Most recent reading; absent means "No recent readings"
    pub latest: Option<Reading>,
    /// Display form of the latest reading's timestamp
    pub latest_at: Option<String>,
    pub threshold: Option<Threshold>,
    pub threshold_state: ThresholdState,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceCard {
    pub id: DeviceId,
    pub device_id: String,
    pub name: Option<String>,
    pub sensor_count: usize,
    pub sensors: Vec<SensorCard>,
}

/// A sensor whose latest reading could not be fetched.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FailureEntry {
    pub sensor_id: SensorId,
    pub device_id: String,
    pub sensor_number: SensorNumber,
    /// `fetch_failed`, `not_found`, ...
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardView {
    pub devices: Vec<DeviceCard>,
    pub alerts: Vec<Alert>,
    /// Unread count among `alerts` only, not across the whole backend
    pub unread_recent_alerts: usize,
    pub failures: Vec<FailureEntry>,
    /// Non-fatal problems not tied to a single sensor
    pub errors: Vec<String>,
}

/// Join the directory, the latest readings and the recent alerts into cards.
pub fn assemble_dashboard(
    devices: &[Device],
    mut latest: LatestReadings,
    alerts: AppResult<Vec<Alert>>,
    format: &DisplayFormat,
) -> DashboardView {
    let cards = devices
        .iter()
        .map(|device| DeviceCard {
            id: device.id,
            device_id: device.hardware_id.clone(),
            name: device.name.clone(),
            sensor_count: device.sensors.len(),
            sensors: device
                .sensors
                .iter()
                .map(|sensor| {
                    let reading = latest.readings.remove(&sensor.id);
                    SensorCard {
                        id: sensor.id,
                        number: sensor.number,
                        label: sensor.label(),
                        latest_at: reading
                            .as_ref()
                            .map(|r| display_timestamp(r.timestamp.as_deref(), format)),
                        threshold_state: ThresholdState::evaluate(
                            reading.as_ref(),
                            sensor.threshold.as_ref(),
                        ),
                        threshold: sensor.threshold.clone(),
                        latest: reading,
                    }
                })
                .collect(),
        })
        .collect();

    let failures = latest
        .failures
        .into_iter()
        .map(|f| FailureEntry {
            sensor_id: f.sensor_id,
            device_id: f.hardware_id,
            sensor_number: f.number,
            kind: f.error.kind().to_string(),
            message: f.error.to_string(),
        })
        .collect();

    let mut errors = Vec::new();
    let alerts = alerts.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "dashboard_alerts_unavailable");
        errors.push(format!("Alerts unavailable: {e}"));
        Vec::new()
    });
    let unread_recent_alerts = alerts.iter().filter(|a| !a.read).count();

    DashboardView {
        devices: cards,
        alerts,
        unread_recent_alerts,
        failures,
        errors,
    }
}

/// Load everything the dashboard page shows.
///
/// # Errors
///
/// Fails only if the device directory cannot be loaded. Per-sensor and alert
/// failures are reported inside the view.
pub async fn build_dashboard(state: &AppState) -> AppResult<DashboardView> {
    let devices = state.devices().await?;

    let latest = project_latest(
        state.backend.as_ref(),
        &devices,
        state.config.latest_reading_concurrency,
    )
    .await;

    let alerts = state
        .backend
        .list_alerts(0, state.config.dashboard_alert_limit)
        .await;

    Ok(assemble_dashboard(
        &devices,
        latest,
        alerts,
        &state.display_format,
    ))
}

/// Reading history of one sensor, ready for the chart and table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeriesView {
    pub device_id: String,
    pub sensor_number: SensorNumber,
    /// Global identity, when the sensor is known to the directory
    pub sensor_id: Option<SensorId>,
    pub label: Option<String>,
    pub threshold: Option<Threshold>,
    pub points: Vec<SeriesPoint>,
    pub min: f64,
    pub max: f64,
}

/// Fetch and normalize the history of one sensor.
///
/// # Errors
///
/// `AppError::NotFound` for an unknown device/sensor pair,
/// `AppError::BadRequest` for an empty device identifier,
/// `AppError::FetchFailed` for any other backend failure.
pub async fn sensor_series(
    state: &AppState,
    hardware_id: &str,
    number: SensorNumber,
    limit: Option<u32>,
) -> AppResult<SeriesView> {
    let query = ReadingQuery::sensor(hardware_id, number, limit);
    let readings = state.backend.fetch_readings(&query).await?;
    let series = normalize_series(&readings, &state.display_format);

    // Threshold and label are decoration; the series stands without them
    let sensor = match state.devices().await {
        Ok(devices) => devices
            .iter()
            .find(|d| d.hardware_id == hardware_id)
            .and_then(|d| d.find_sensor(number))
            .cloned(),
        Err(e) => {
            tracing::warn!(error = %e, device = hardware_id, "series_directory_unavailable");
            None
        }
    };

    Ok(SeriesView {
        device_id: hardware_id.to_string(),
        sensor_number: number,
        sensor_id: sensor.as_ref().map(|s| s.id),
        label: sensor.as_ref().map(Sensor::label),
        threshold: sensor.and_then(|s| s.threshold),
        points: series.points,
        min: series.min,
        max: series.max,
    })
}

/// Readings across all sensors, most recent first, normalized for display.
///
/// # Errors
///
/// `AppError::FetchFailed` if the backend call fails.
pub async fn recent_readings(
    state: &AppState,
    limit: Option<u32>,
) -> AppResult<NormalizedSeries> {
    let readings = state
        .backend
        .fetch_readings(&ReadingQuery::All { limit })
        .await?;
    Ok(normalize_series(&readings, &state.display_format))
}
