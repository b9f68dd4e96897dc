mod handlers;
mod types;

pub use handlers::{create_sensor, get_threshold, list_sensors, put_threshold};
pub use types::SensorsQuery;

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{
    __path_create_sensor, __path_get_threshold, __path_list_sensors, __path_put_threshold,
};
