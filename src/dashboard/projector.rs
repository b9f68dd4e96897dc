use futures::stream::{self, StreamExt};
use std::collections::HashMap;

use crate::backend::models::{Device, Reading, SensorId, SensorNumber};
use crate::backend::store::{ReadingQuery, ReadingStore};
use crate::error::AppError;

/// A sensor whose latest-reading lookup failed.
#[derive(Debug)]
pub struct SensorFailure {
    pub sensor_id: SensorId,
    pub hardware_id: String,
    pub number: SensorNumber,
    pub error: AppError,
}

/// Most recent reading per sensor, keyed by global sensor identity.
///
/// Sensors that never recorded a reading, and sensors whose lookup failed,
/// have no entry in `readings`. Failed lookups are listed in `failures`.
#[derive(Debug, Default)]
pub struct LatestReadings {
    pub readings: HashMap<SensorId, Reading>,
    pub failures: Vec<SensorFailure>,
}

impl LatestReadings {
    pub fn get(&self, sensor_id: SensorId) -> Option<&Reading> {
        self.readings.get(&sensor_id)
    }
}

/// Fetch the most recent reading of every sensor on every device.
///
/// Issues one `limit = 1` query per sensor, at most `concurrency` in flight,
/// and merges the results once all of them have settled. A failed query only
/// affects its own sensor.
pub async fn project_latest<S: ReadingStore>(
    store: &S,
    devices: &[Device],
    concurrency: usize,
) -> LatestReadings {
    // Owned lookups keep the stream's futures Send
    let lookups: Vec<(SensorId, String, SensorNumber)> = devices
        .iter()
        .flat_map(|device| {
            device
                .sensors
                .iter()
                .map(move |sensor| (sensor.id, device.hardware_id.clone(), sensor.number))
        })
        .collect();

    let total = lookups.len();

    let outcomes: Vec<_> = stream::iter(lookups)
        .map(|(sensor_id, hardware_id, number)| async move {
            let query = ReadingQuery::sensor(hardware_id.as_str(), number, Some(1));
            let result = store.fetch_readings(&query).await;
            (sensor_id, hardware_id, number, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut latest = LatestReadings::default();

    for (sensor_id, hardware_id, number, result) in outcomes {
        match result {
            Ok(readings) => {
                if let Some(reading) = readings.into_iter().next() {
                    latest.readings.insert(sensor_id, reading);
                }
            }
            Err(error) => {
                tracing::warn!(
                    sensor_id = %sensor_id,
                    device = %hardware_id,
                    sensor_number = %number,
                    error = %error,
                    "latest_reading_failed"
                );
                latest.failures.push(SensorFailure {
                    sensor_id,
                    hardware_id,
                    number,
                    error,
                });
            }
        }
    }

    // Keep failure order stable regardless of completion order
    latest.failures.sort_by_key(|f| f.sensor_id);

    tracing::debug!(
        sensors = total,
        with_reading = latest.readings.len(),
        failed = latest.failures.len(),
        "latest_readings_projected"
    );

    latest
}
