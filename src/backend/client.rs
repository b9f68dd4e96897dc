use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::backend::models::{
    Alert, AlertId, BackendErrorBody, Device, DeviceCreate, Reading, Sensor, SensorCreate,
    SensorId, Threshold, ThresholdUpdate,
};
use crate::backend::store::{DeviceDirectory, ReadingQuery, ReadingStore};
use crate::config::{Config, ConfigError};
use crate::error::{AppError, AppResult};

/// HTTP client for the soil-moisture backend REST API.
pub struct BackendClient {
    http_client: Client,
    base_url: Url,
    page_size: u32,
}

impl BackendClient {
    /// # Errors
    ///
    /// Returns `AppError::Config` if the base URL cannot be used, and
    /// `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> AppResult<Self> {
        let base_url = Url::parse(&config.backend_base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                ConfigError::Invalid("BACKEND_BASE_URL", config.backend_base_url.clone())
            })?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.backend_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            page_size: config.directory_page_size.max(1),
        })
    }

    /// Build an endpoint URL below the base URL. Segments are percent-encoded;
    /// an empty trailing segment yields a trailing slash.
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Internal("Backend base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(method = %method, url = %url, "backend_request");
        self.http_client.request(method, url)
    }

    /// Get one page of registered devices.
    ///
    /// # Errors
    ///
    /// Returns `AppError::FetchFailed` if the request fails or returns an error status.
    pub async fn list_devices_page(&self, skip: u32, limit: u32) -> AppResult<Vec<Device>> {
        let url = self.endpoint(&["devices", ""])?;
        let response = self
            .request(Method::GET, url)
            .query(&[("skip", skip), ("limit", limit)])
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, "Devices").await
    }

    /// Register a device.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the backend rejects the device (for
    /// example, already registered), `AppError::FetchFailed` otherwise.
    pub async fn create_device(&self, device: &DeviceCreate) -> AppResult<Device> {
        if device.hardware_id.trim().is_empty() {
            return Err(AppError::BadRequest("device_id must not be empty".to_string()));
        }

        let url = self.endpoint(&["devices", ""])?;
        let response = self
            .request(Method::POST, url)
            .json(device)
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, "Device").await
    }

    /// # Errors
    ///
    /// Returns `AppError::FetchFailed` if the request fails or returns an error status.
    pub async fn list_sensors(&self) -> AppResult<Vec<Sensor>> {
        let url = self.endpoint(&["sensors", ""])?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, "Sensors").await
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown sensor identity.
    pub async fn get_sensor(&self, sensor_id: SensorId) -> AppResult<Sensor> {
        let url = self.endpoint(&["sensors", &sensor_id.to_string()])?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, &format!("Sensor {sensor_id}")).await
    }

    /// Register a sensor on a device.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the backend rejects the sensor (for
    /// example, the number is already taken on that device).
    pub async fn create_sensor(&self, sensor: &SensorCreate) -> AppResult<Sensor> {
        let url = self.endpoint(&["sensors", ""])?;
        let response = self
            .request(Method::POST, url)
            .json(sensor)
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, "Sensor").await
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the sensor has no threshold configured.
    pub async fn get_threshold(&self, sensor_id: SensorId) -> AppResult<Threshold> {
        let url = self.endpoint(&["sensors", &sensor_id.to_string(), "threshold"])?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, &format!("Threshold for sensor {sensor_id}")).await
    }

    /// Create or replace the threshold of a sensor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for inconsistent bounds (checked before
    /// any request is made) and `AppError::NotFound` for an unknown sensor.
    pub async fn set_threshold(
        &self,
        sensor_id: SensorId,
        threshold: &ThresholdUpdate,
    ) -> AppResult<Threshold> {
        threshold.validate().map_err(AppError::BadRequest)?;

        let url = self.endpoint(&["sensors", &sensor_id.to_string(), "threshold"])?;
        let response = self
            .request(Method::POST, url)
            .json(threshold)
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, &format!("Sensor {sensor_id}")).await
    }

    /// # Errors
    ///
    /// Returns `AppError::FetchFailed` if the request fails or returns an error status.
    pub async fn list_alerts(&self, skip: u32, limit: u32) -> AppResult<Vec<Alert>> {
        let url = self.endpoint(&["alerts", ""])?;
        let response = self
            .request(Method::GET, url)
            .query(&[("skip", skip), ("limit", limit)])
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, "Alerts").await
    }

    /// Flag an alert as read.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown alert.
    pub async fn mark_alert_read(&self, alert_id: AlertId) -> AppResult<Alert> {
        let url = self.endpoint(&["alerts", &alert_id.to_string()])?;
        let response = self
            .request(Method::PUT, url)
            .send()
            .await
            .map_err(request_failed)?;

        decode(response, &format!("Alert {alert_id}")).await
    }
}

impl ReadingStore for BackendClient {
    async fn fetch_readings(&self, query: &ReadingQuery) -> AppResult<Vec<Reading>> {
        let (url, subject) = match query {
            ReadingQuery::Sensor {
                hardware_id,
                number,
                ..
            } => {
                if hardware_id.trim().is_empty() {
                    return Err(AppError::BadRequest(
                        "device identifier must not be empty".to_string(),
                    ));
                }
                (
                    self.endpoint(&["readings", hardware_id.as_str(), &number.to_string()])?,
                    format!("Sensor {number} on device '{hardware_id}'"),
                )
            }
            ReadingQuery::All { .. } => (self.endpoint(&["readings", ""])?, "Readings".to_string()),
        };

        let mut request = self.request(Method::GET, url);
        if let Some(limit) = query.limit() {
            request = request.query(&[("limit", limit)]);
        }

        let response = request.send().await.map_err(request_failed)?;
        decode(response, &subject).await
    }
}

impl DeviceDirectory for BackendClient {
    /// Walk every page of `/devices/` until a short page is returned.
    async fn list_devices(&self) -> AppResult<Vec<Device>> {
        let mut devices = Vec::new();
        let mut skip = 0;

        loop {
            let page = self.list_devices_page(skip, self.page_size).await?;
            let fetched = u32::try_from(page.len()).unwrap_or(u32::MAX);
            devices.extend(page);

            if fetched < self.page_size {
                break;
            }
            skip = skip.saturating_add(fetched);
        }

        tracing::debug!(count = devices.len(), "device_directory_loaded");
        Ok(devices)
    }
}

fn request_failed(e: reqwest::Error) -> AppError {
    AppError::FetchFailed(format!("Request failed: {e}"))
}

/// Map the backend status to an `AppError`, or decode the JSON body.
async fn decode<T: DeserializeOwned>(response: Response, subject: &str) -> AppResult<T> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(format!("{subject} not found")));
    }

    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        let text = response.text().await.unwrap_or_default();
        return Err(AppError::BadRequest(error_detail(&text)));
    }

    if !status.is_success() {
        return Err(AppError::FetchFailed(format!(
            "HTTP {}: {}",
            status,
            response.text().await.unwrap_or_default()
        )));
    }

    let text = response
        .text()
        .await
        .map_err(|e| AppError::FetchFailed(format!("Failed to get response text: {e}")))?;

    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body_preview = %text.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        AppError::FetchFailed(format!("Failed to parse response: {e}"))
    })
}

/// Pull the `detail` message out of a backend error body.
fn error_detail(text: &str) -> String {
    match serde_json::from_str::<BackendErrorBody>(text) {
        Ok(BackendErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(BackendErrorBody { detail }) => detail.to_string(),
        Err(_) if text.is_empty() => "Rejected by backend".to_string(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_segments_and_keeps_base_path() {
        let client = BackendClient::new(&Config::with_backend("http://localhost:8000/api/")).unwrap();

        assert_eq!(
            client.endpoint(&["devices", ""]).unwrap().as_str(),
            "http://localhost:8000/api/devices/"
        );
        assert_eq!(
            client.endpoint(&["readings", "greenhouse 1", "2"]).unwrap().as_str(),
            "http://localhost:8000/api/readings/greenhouse%201/2"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            BackendClient::new(&Config::with_backend("not a url")),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn error_detail_prefers_backend_message() {
        assert_eq!(
            error_detail(r#"{"detail": "Device already registered"}"#),
            "Device already registered"
        );
        assert_eq!(error_detail(""), "Rejected by backend");
        assert_eq!(error_detail("oops"), "oops");
    }
}
