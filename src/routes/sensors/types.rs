use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SensorsQuery {
    /// Only sensors of this device (internal device id)
    pub device: Option<i64>,
    /// Only sensors without a configured threshold
    #[serde(default)]
    pub missing_threshold: bool,
}
