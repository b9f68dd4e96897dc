//! Aggregation behind the dashboard: latest reading per sensor, reading
//! history normalization, and the per-device card view.

pub mod normalizer;
pub mod projector;
pub mod view;

pub use normalizer::{
    display_timestamp, normalize_series, parse_timestamp, DisplayFormat, NormalizedSeries,
    SeriesPoint, ABSENT_TIMESTAMP, INVALID_TIMESTAMP,
};
pub use projector::{project_latest, LatestReadings, SensorFailure};
pub use view::{
    assemble_dashboard, build_dashboard, recent_readings, sensor_series, DashboardView,
    DeviceCard, FailureEntry, SensorCard, SeriesView, ThresholdState,
};
