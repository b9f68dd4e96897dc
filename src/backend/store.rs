use std::future::Future;

use crate::backend::models::{Device, Reading, SensorNumber};
use crate::error::AppResult;

/// Which readings to fetch from the reading store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadingQuery {
    /// History of one sensor, addressed by device identifier and the
    /// sensor's device-scoped number.
    Sensor {
        hardware_id: String,
        number: SensorNumber,
        limit: Option<u32>,
    },
    /// Readings across every sensor.
    All { limit: Option<u32> },
}

impl ReadingQuery {
    pub fn sensor(hardware_id: impl Into<String>, number: SensorNumber, limit: Option<u32>) -> Self {
        Self::Sensor {
            hardware_id: hardware_id.into(),
            number,
            limit,
        }
    }

    pub fn limit(&self) -> Option<u32> {
        match self {
            Self::Sensor { limit, .. } | Self::All { limit } => *limit,
        }
    }
}

/// Source of reading history. Results are ordered most-recent-first.
///
/// Implementations must report an unknown device/sensor pair as
/// `AppError::NotFound` and any other backend failure as
/// `AppError::FetchFailed`. No retries happen at this layer.
pub trait ReadingStore: Send + Sync {
    fn fetch_readings(
        &self,
        query: &ReadingQuery,
    ) -> impl Future<Output = AppResult<Vec<Reading>>> + Send;
}

/// Source of the registered devices, each with its sensors and thresholds.
pub trait DeviceDirectory: Send + Sync {
    fn list_devices(&self) -> impl Future<Output = AppResult<Vec<Device>>> + Send;
}
