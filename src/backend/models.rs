use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Internal numeric identity of a device, assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

/// Global sensor identity. This is the join key for readings, thresholds
/// and latest-reading lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SensorId(pub i64);

/// Sensor number scoped to its owning device. Never unique across devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SensorNumber(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AlertId(pub i64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SensorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Moisture value as received from the backend.
///
/// The backend does not guarantee a number here, so anything that is not a
/// JSON number is kept verbatim in `Raw` and passed through to the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Moisture {
    Value(f64),
    Raw(serde_json::Value),
}

impl Moisture {
    /// Numeric value, if it is a number and not NaN.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }
}

impl Default for Moisture {
    fn default() -> Self {
        Self::Raw(serde_json::Value::Null)
    }
}

impl From<f64> for Moisture {
    fn from(v: f64) -> Self {
        Self::Value(v)
    }
}

impl fmt::Display for Moisture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Raw(serde_json::Value::Null) => Ok(()),
            Self::Raw(serde_json::Value::String(s)) => f.write_str(s),
            Self::Raw(other) => write!(f, "{other}"),
        }
    }
}

/// One timestamped moisture measurement. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub id: i64,
    /// Global sensor identity (not the device-scoped number)
    pub sensor_id: SensorId,
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub moisture: Moisture,
    /// Raw serialized timestamp; may be missing or malformed
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Acceptable moisture range for a sensor. Unset bounds mean "no bound".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Threshold {
    #[serde(default)]
    pub id: Option<i64>,
    pub sensor_id: SensorId,
    #[serde(default)]
    pub min_moisture: Option<f64>,
    #[serde(default)]
    pub max_moisture: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sensor {
    pub id: SensorId,
    /// Device-scoped sensor number
    #[serde(rename = "sensor_id")]
    pub number: SensorNumber,
    /// Internal identity of the owning device
    #[serde(rename = "device_id")]
    pub device: DeviceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub threshold: Option<Threshold>,
}

impl Sensor {
    /// Display label: the configured name, or `Sensor {number}`.
    pub fn label(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Sensor {}", self.number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Device {
    pub id: DeviceId,
    /// Externally assigned device identifier
    #[serde(rename = "device_id")]
    pub hardware_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

impl Device {
    pub fn find_sensor(&self, number: SensorNumber) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.number == number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub id: AlertId,
    pub sensor_id: SensorId,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub read: bool,
}

/// Payload for `POST /devices/`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceCreate {
    #[serde(rename = "device_id")]
    pub hardware_id: String,
    pub name: String,
}

/// Payload for `POST /sensors/`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SensorCreate {
    #[serde(rename = "device_id")]
    pub device: DeviceId,
    #[serde(rename = "sensor_id")]
    pub number: SensorNumber,
    pub name: String,
}

/// Payload for `POST /sensors/{id}/threshold`
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ThresholdUpdate {
    #[serde(default)]
    pub min_moisture: Option<f64>,
    #[serde(default)]
    pub max_moisture: Option<f64>,
}

impl ThresholdUpdate {
    /// Reject bounds the backend would store but no evaluator could use.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        for (name, bound) in [("min_moisture", self.min_moisture), ("max_moisture", self.max_moisture)] {
            if let Some(v) = bound
                && !v.is_finite()
            {
                return Err(format!("{name} must be a finite number"));
            }
        }

        if let (Some(min), Some(max)) = (self.min_moisture, self.max_moisture)
            && min > max
        {
            return Err(format!(
                "min_moisture ({min}) must not exceed max_moisture ({max})"
            ));
        }

        Ok(())
    }
}

/// Error body returned by the backend (`{"detail": ...}`)
#[derive(Debug, Deserialize)]
pub(crate) struct BackendErrorBody {
    pub detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_json_keeps_number_and_identity_apart() {
        let sensor: Sensor = serde_json::from_str(
            r#"{"id": 41, "sensor_id": 2, "device_id": 7, "name": null, "threshold": null}"#,
        )
        .unwrap();

        assert_eq!(sensor.id, SensorId(41));
        assert_eq!(sensor.number, SensorNumber(2));
        assert_eq!(sensor.device, DeviceId(7));
        assert_eq!(sensor.label(), "Sensor 2");
    }

    #[test]
    fn moisture_accepts_non_numeric_values() {
        let reading: Reading =
            serde_json::from_str(r#"{"id": 1, "sensor_id": 3, "moisture": "wet", "timestamp": null}"#)
                .unwrap();
        assert_eq!(reading.moisture, Moisture::Raw(serde_json::json!("wet")));
        assert_eq!(reading.moisture.value(), None);

        let reading: Reading = serde_json::from_str(r#"{"id": 2, "sensor_id": 3}"#).unwrap();
        assert_eq!(reading.moisture, Moisture::Raw(serde_json::Value::Null));
        assert_eq!(reading.timestamp, None);

        assert_eq!(Moisture::Value(f64::NAN).value(), None);
        assert_eq!(Moisture::Value(42.5).value(), Some(42.5));
    }

    #[test]
    fn threshold_update_validation() {
        assert!(ThresholdUpdate::default().validate().is_ok());
        assert!(
            ThresholdUpdate { min_moisture: Some(20.0), max_moisture: Some(60.0) }
                .validate()
                .is_ok()
        );
        assert!(
            ThresholdUpdate { min_moisture: Some(70.0), max_moisture: Some(60.0) }
                .validate()
                .is_err()
        );
        assert!(
            ThresholdUpdate { min_moisture: Some(f64::INFINITY), max_moisture: None }
                .validate()
                .is_err()
        );
    }
}
