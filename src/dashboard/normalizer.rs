//! Chart/table preparation of a reading history.
//!
//! Every reading yields exactly one [`SeriesPoint`], in input order, with a
//! display timestamp and the moisture value passed through untouched. The
//! y-axis bounds are taken from the readings whose moisture is a usable
//! number. Bad timestamps never fail the series; they render as
//! [`INVALID_TIMESTAMP`] (or [`ABSENT_TIMESTAMP`] when missing).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt::Write;
use std::sync::LazyLock;
use utoipa::ToSchema;

use crate::backend::models::{Moisture, Reading};
use crate::config::DEFAULT_DISPLAY_TIME_FORMAT;

/// Shown when a reading carries no timestamp at all.
pub const ABSENT_TIMESTAMP: &str = "N/A";

/// Shown when a timestamp is present but cannot be interpreted.
pub const INVALID_TIMESTAMP: &str = "Invalid Date";

/// Sub-second fraction following the seconds field, e.g. `10:00:00.123456`.
static FRACTIONAL_SECONDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2}:\d{2}:\d{2})\.\d+").expect("fractional seconds pattern is valid")
});

/// Timestamp layouts with an explicit offset, tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

/// Offset-less layouts; the backend writes these in UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// How parsed timestamps are rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFormat {
    pattern: String,
    offset: FixedOffset,
}

impl DisplayFormat {
    /// `pattern` is a chrono strftime pattern; `offset` is the display zone.
    pub fn new(pattern: impl Into<String>, offset: FixedOffset) -> Self {
        Self {
            pattern: pattern.into(),
            offset,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Render an instant, or `None` if the pattern cannot be applied.
    fn render(&self, instant: DateTime<Utc>) -> Option<String> {
        let mut out = String::new();
        write!(
            out,
            "{}",
            instant.with_timezone(&self.offset).format(&self.pattern)
        )
        .ok()?;
        Some(out)
    }
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_TIME_FORMAT, Utc.fix())
    }
}

/// One chart/table row.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SeriesPoint {
    /// Display timestamp, or a sentinel
    pub timestamp: String,
    /// Moisture exactly as received
    #[schema(value_type = Option<f64>)]
    pub moisture: Moisture,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NormalizedSeries {
    pub points: Vec<SeriesPoint>,
    /// Smallest usable moisture value (0 when there is none)
    pub min: f64,
    /// Largest usable moisture value (0 when there is none)
    pub max: f64,
}

/// Strip the sub-second fraction and parse what is left.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let stripped = FRACTIONAL_SECONDS.replace(raw.trim(), "${1}");
    let stripped = stripped.as_ref();

    if let Ok(dt) = DateTime::parse_from_rfc3339(stripped) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(stripped, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, format) {
            return Some(naive.and_utc());
        }
    }

    // Date-only values are midnight UTC
    NaiveDate::parse_from_str(stripped, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Display string for a possibly missing, possibly malformed timestamp.
pub fn display_timestamp(raw: Option<&str>, format: &DisplayFormat) -> String {
    let Some(raw) = raw else {
        return ABSENT_TIMESTAMP.to_string();
    };

    parse_timestamp(raw)
        .and_then(|instant| format.render(instant))
        .unwrap_or_else(|| INVALID_TIMESTAMP.to_string())
}

/// Turn raw readings into display rows plus usable min/max bounds.
pub fn normalize_series(readings: &[Reading], format: &DisplayFormat) -> NormalizedSeries {
    let points: Vec<SeriesPoint> = readings
        .iter()
        .map(|reading| SeriesPoint {
            timestamp: display_timestamp(reading.timestamp.as_deref(), format),
            moisture: reading.moisture.clone(),
        })
        .collect();

    let (min, max) = readings
        .iter()
        .filter_map(|reading| reading.moisture.value())
        .fold(None, |bounds, v| match bounds {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })
        .unwrap_or((0.0, 0.0));

    let invalid = points
        .iter()
        .filter(|p| p.timestamp == INVALID_TIMESTAMP)
        .count();
    if invalid > 0 {
        tracing::debug!(invalid, total = points.len(), "series_invalid_timestamps");
    }

    NormalizedSeries { points, min, max }
}
