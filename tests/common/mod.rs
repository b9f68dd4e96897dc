//! In-process stand-in for the soil-moisture backend.
//!
//! Serves the same REST surface as the real backend over a loopback socket so
//! the client, the dashboard and the routes can be exercised end to end.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use moisture_dash::backend::models::{
    Alert, AlertId, Device, DeviceCreate, DeviceId, Reading, Sensor, SensorCreate, SensorId,
    SensorNumber, Threshold, ThresholdUpdate,
};
use moisture_dash::backend::BackendClient;
use moisture_dash::common::AppState;
use moisture_dash::config::Config;

#[derive(Default)]
struct Data {
    devices: Vec<Device>,
    readings: HashMap<(String, i64), Vec<Reading>>,
    alerts: Vec<Alert>,
    failing_devices: HashSet<String>,
    fail_alerts: bool,
    /// Applied once, after the device page has been read
    device_listing_delay: Option<Duration>,
}

#[derive(Default)]
struct Shared {
    data: Mutex<Data>,
    requests: AtomicUsize,
    device_pages: AtomicUsize,
}

impl Shared {
    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

type SharedState = Arc<Shared>;

pub struct FakeBackend {
    pub base_url: String,
    shared: SharedState,
}

impl FakeBackend {
    /// Start a backend seeded with the standard fixture.
    pub async fn start() -> Self {
        let shared: SharedState = Arc::new(Shared::default());
        *shared.data.lock().unwrap() = fixture();

        let app = Router::new()
            .route("/devices/", get(list_devices).post(create_device))
            .route("/sensors/", get(list_sensors).post(create_sensor))
            .route("/sensors/{id}", get(get_sensor))
            .route("/sensors/{id}/threshold", get(get_threshold).post(set_threshold))
            .route("/readings/", get(all_readings))
            .route("/readings/{hardware_id}/{number}", get(sensor_readings))
            .route("/alerts/", get(list_alerts))
            .route("/alerts/{id}", put(mark_alert_read))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            shared,
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::with_backend(&self.base_url);
        config.disable_rate_limiting = true;
        config.backend_timeout_seconds = 5;
        config
    }

    pub fn client(&self) -> BackendClient {
        BackendClient::new(&self.config()).unwrap()
    }

    pub fn app_state(&self) -> AppState {
        let config = self.config();
        let client = BackendClient::new(&config).unwrap();
        AppState::new(config, client).unwrap()
    }

    /// Requests served so far, across all endpoints.
    pub fn requests(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }

    /// `GET /devices/` calls served so far.
    pub fn device_pages(&self) -> usize {
        self.shared.device_pages.load(Ordering::SeqCst)
    }

    /// Answer reading queries for this device with a 500.
    pub fn fail_readings_for(&self, hardware_id: &str) {
        self.shared
            .data
            .lock()
            .unwrap()
            .failing_devices
            .insert(hardware_id.to_string());
    }

    /// Hold the next `GET /devices/` response for `delay`. The page content
    /// is read before the delay starts.
    pub fn delay_next_device_listing(&self, delay: Duration) {
        self.shared.data.lock().unwrap().device_listing_delay = Some(delay);
    }

    pub fn fail_alerts(&self) {
        self.shared.data.lock().unwrap().fail_alerts = true;
    }

    /// Append an unread alert after the fixture's alerts.
    pub fn push_unread_alert(&self, id: i64, sensor_id: i64) {
        self.shared.data.lock().unwrap().alerts.push(Alert {
            id: AlertId(id),
            sensor_id: SensorId(sensor_id),
            message: "Moisture above maximum".to_string(),
            timestamp: Some("2024-04-29T07:00:00".to_string()),
            read: false,
        });
    }
}

fn threshold(id: i64, sensor_id: i64, min: Option<f64>, max: Option<f64>) -> Threshold {
    Threshold {
        id: Some(id),
        sensor_id: SensorId(sensor_id),
        min_moisture: min,
        max_moisture: max,
    }
}

fn sensor(id: i64, number: i64, device: i64, name: Option<&str>, t: Option<Threshold>) -> Sensor {
    Sensor {
        id: SensorId(id),
        number: SensorNumber(number),
        device: DeviceId(device),
        name: name.map(str::to_string),
        threshold: t,
    }
}

fn reading(id: i64, sensor_id: i64, moisture: f64, timestamp: &str) -> Reading {
    Reading {
        id,
        sensor_id: SensorId(sensor_id),
        moisture: moisture.into(),
        timestamp: Some(timestamp.to_string()),
    }
}

/// Three devices:
///
/// - `greenhouse-1`: sensor 10 (number 1, "Bed A", 20..=60, latest 15.0) and
///   sensor 11 (number 2, unnamed, no readings)
/// - `field-7`: sensor 20 (number 1, "North row", min 30, latest 55.5)
/// - `spare`: no sensors
fn fixture() -> Data {
    let devices = vec![
        Device {
            id: DeviceId(1),
            hardware_id: "greenhouse-1".to_string(),
            name: Some("Greenhouse".to_string()),
            sensors: vec![
                sensor(10, 1, 1, Some("Bed A"), Some(threshold(1, 10, Some(20.0), Some(60.0)))),
                sensor(11, 2, 1, None, None),
            ],
        },
        Device {
            id: DeviceId(2),
            hardware_id: "field-7".to_string(),
            name: Some("Field 7".to_string()),
            sensors: vec![sensor(
                20,
                1,
                2,
                Some("North row"),
                Some(threshold(2, 20, Some(30.0), None)),
            )],
        },
        Device {
            id: DeviceId(3),
            hardware_id: "spare".to_string(),
            name: Some("Spare".to_string()),
            sensors: vec![],
        },
    ];

    let mut readings = HashMap::new();
    readings.insert(
        ("greenhouse-1".to_string(), 1),
        vec![
            reading(3, 10, 15.0, "2024-05-01T12:00:00.654321"),
            reading(2, 10, 25.0, "2024-05-01T11:00:00.1"),
            reading(1, 10, 35.0, "2024-05-01T10:00:00"),
        ],
    );
    readings.insert(("greenhouse-1".to_string(), 2), vec![]);
    readings.insert(
        ("field-7".to_string(), 1),
        vec![reading(4, 20, 55.5, "2024-05-01T09:30:00Z")],
    );

    let alerts = vec![
        Alert {
            id: AlertId(1),
            sensor_id: SensorId(10),
            message: "Moisture below minimum".to_string(),
            timestamp: Some("2024-05-01T12:00:01".to_string()),
            read: false,
        },
        Alert {
            id: AlertId(2),
            sensor_id: SensorId(20),
            message: "Sensor back online".to_string(),
            timestamp: Some("2024-04-30T08:00:00".to_string()),
            read: true,
        },
    ];

    Data {
        devices,
        readings,
        alerts,
        ..Data::default()
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

#[derive(Deserialize)]
struct Page {
    skip: Option<usize>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct Limit {
    limit: Option<usize>,
}

fn all_sensors(data: &Data) -> impl Iterator<Item = &Sensor> {
    data.devices.iter().flat_map(|d| d.sensors.iter())
}

fn sensor_mut(data: &mut Data, id: i64) -> Option<&mut Sensor> {
    data.devices
        .iter_mut()
        .flat_map(|d| d.sensors.iter_mut())
        .find(|s| s.id == SensorId(id))
}

async fn list_devices(State(shared): State<SharedState>, Query(page): Query<Page>) -> Response {
    shared.hit();
    shared.device_pages.fetch_add(1, Ordering::SeqCst);

    let (devices, delay) = {
        let mut data = shared.data.lock().unwrap();
        let devices: Vec<Device> = data
            .devices
            .iter()
            .skip(page.skip.unwrap_or(0))
            .take(page.limit.unwrap_or(100))
            .cloned()
            .collect();
        (devices, data.device_listing_delay.take())
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    Json(devices).into_response()
}

async fn create_device(
    State(shared): State<SharedState>,
    Json(payload): Json<DeviceCreate>,
) -> Response {
    shared.hit();
    let mut data = shared.data.lock().unwrap();

    if data.devices.iter().any(|d| d.hardware_id == payload.hardware_id) {
        return detail(StatusCode::BAD_REQUEST, "Device already registered");
    }

    let id = data.devices.iter().map(|d| d.id.0).max().unwrap_or(0) + 1;
    let device = Device {
        id: DeviceId(id),
        hardware_id: payload.hardware_id,
        name: Some(payload.name),
        sensors: vec![],
    };
    data.devices.push(device.clone());
    Json(device).into_response()
}

async fn list_sensors(State(shared): State<SharedState>) -> Response {
    shared.hit();
    let data = shared.data.lock().unwrap();
    let sensors: Vec<Sensor> = all_sensors(&data).cloned().collect();
    Json(sensors).into_response()
}

async fn get_sensor(State(shared): State<SharedState>, Path(id): Path<i64>) -> Response {
    shared.hit();
    let data = shared.data.lock().unwrap();
    match all_sensors(&data).find(|s| s.id == SensorId(id)) {
        Some(sensor) => Json(sensor.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Sensor not found"),
    }
}

async fn create_sensor(
    State(shared): State<SharedState>,
    Json(payload): Json<SensorCreate>,
) -> Response {
    shared.hit();
    let mut data = shared.data.lock().unwrap();

    let next_id = all_sensors(&data).map(|s| s.id.0).max().unwrap_or(0) + 1;
    let Some(device) = data.devices.iter_mut().find(|d| d.id == payload.device) else {
        return detail(StatusCode::NOT_FOUND, "Device not found");
    };
    if device.find_sensor(payload.number).is_some() {
        return detail(StatusCode::BAD_REQUEST, "Sensor already exists for this device");
    }

    let created = Sensor {
        id: SensorId(next_id),
        number: payload.number,
        device: payload.device,
        name: Some(payload.name),
        threshold: None,
    };
    device.sensors.push(created.clone());
    let key = (device.hardware_id.clone(), payload.number.0);
    data.readings.insert(key, vec![]);
    Json(created).into_response()
}

async fn get_threshold(State(shared): State<SharedState>, Path(id): Path<i64>) -> Response {
    shared.hit();
    let data = shared.data.lock().unwrap();
    match all_sensors(&data)
        .find(|s| s.id == SensorId(id))
        .and_then(|s| s.threshold.clone())
    {
        Some(threshold) => Json(threshold).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Threshold not found"),
    }
}

async fn set_threshold(
    State(shared): State<SharedState>,
    Path(id): Path<i64>,
    Json(payload): Json<ThresholdUpdate>,
) -> Response {
    shared.hit();
    let mut data = shared.data.lock().unwrap();
    let Some(sensor) = sensor_mut(&mut data, id) else {
        return detail(StatusCode::NOT_FOUND, "Sensor not found");
    };

    let threshold = Threshold {
        id: Some(sensor.threshold.as_ref().and_then(|t| t.id).unwrap_or(100 + id)),
        sensor_id: SensorId(id),
        min_moisture: payload.min_moisture,
        max_moisture: payload.max_moisture,
    };
    sensor.threshold = Some(threshold.clone());
    Json(threshold).into_response()
}

async fn all_readings(State(shared): State<SharedState>, Query(q): Query<Limit>) -> Response {
    shared.hit();
    let data = shared.data.lock().unwrap();
    let mut readings: Vec<Reading> = data.readings.values().flatten().cloned().collect();
    readings.sort_by(|a, b| b.id.cmp(&a.id));
    readings.truncate(q.limit.unwrap_or(usize::MAX));
    Json(readings).into_response()
}

async fn sensor_readings(
    State(shared): State<SharedState>,
    Path((hardware_id, number)): Path<(String, i64)>,
    Query(q): Query<Limit>,
) -> Response {
    shared.hit();
    let data = shared.data.lock().unwrap();

    if data.failing_devices.contains(&hardware_id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response();
    }

    match data.readings.get(&(hardware_id, number)) {
        Some(history) => {
            let take = q.limit.unwrap_or(history.len());
            Json(history.iter().take(take).cloned().collect::<Vec<_>>()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Sensor not found"),
    }
}

async fn list_alerts(State(shared): State<SharedState>, Query(page): Query<Page>) -> Response {
    shared.hit();
    let data = shared.data.lock().unwrap();

    if data.fail_alerts {
        return (StatusCode::SERVICE_UNAVAILABLE, "alerts offline").into_response();
    }

    let alerts: Vec<Alert> = data
        .alerts
        .iter()
        .skip(page.skip.unwrap_or(0))
        .take(page.limit.unwrap_or(100))
        .cloned()
        .collect();
    Json(alerts).into_response()
}

async fn mark_alert_read(State(shared): State<SharedState>, Path(id): Path<i64>) -> Response {
    shared.hit();
    let mut data = shared.data.lock().unwrap();
    match data.alerts.iter_mut().find(|a| a.id == AlertId(id)) {
        Some(alert) => {
            alert.read = true;
            Json(alert.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Alert not found"),
    }
}
