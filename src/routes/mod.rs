pub mod alerts;
pub mod dashboard;
pub mod devices;
pub mod health;
mod rate_limit;
pub mod readings;
pub mod sensors;

use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use rate_limit::ClientIpKeyExtractor;

use crate::backend::models;
use crate::common::AppState;
use crate::config::ConfigError;
use crate::dashboard as view;
use crate::error::{AppError, AppResult};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        dashboard::get_dashboard,
        devices::list_devices,
        devices::create_device,
        sensors::list_sensors,
        sensors::create_sensor,
        sensors::get_threshold,
        sensors::put_threshold,
        readings::get_sensor_readings,
        readings::list_recent_readings,
        alerts::list_alerts,
        alerts::mark_alert_read,
    ),
    components(
        schemas(
            health::Liveness,
            models::Device,
            models::Sensor,
            models::Threshold,
            models::Reading,
            models::Alert,
            models::DeviceCreate,
            models::SensorCreate,
            models::ThresholdUpdate,
            view::DashboardView,
            view::DeviceCard,
            view::SensorCard,
            view::FailureEntry,
            view::ThresholdState,
            view::SeriesView,
            view::SeriesPoint,
            view::NormalizedSeries,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "dashboard", description = "Aggregated dashboard view"),
        (name = "devices", description = "Device registration and directory"),
        (name = "sensors", description = "Sensor registration and thresholds"),
        (name = "readings", description = "Reading history"),
        (name = "alerts", description = "Alerts and acknowledgement"),
    ),
    info(
        title = "Moisture Dash API",
        description = "Dashboard data service for a soil-moisture sensor network",
        version = "0.1.0"
    )
)]
struct ApiDoc;

/// # Errors
///
/// Returns `AppError::Config` if the rate limiter settings are unusable.
pub fn build_router(state: AppState) -> AppResult<Router> {
    let config = &state.config;

    let api_routes_base = Router::new()
        .route("/dashboard", get(dashboard::get_dashboard))
        .route(
            "/devices",
            get(devices::list_devices).post(devices::create_device),
        )
        .route(
            "/devices/{device_id}/sensors/{sensor_number}/readings",
            get(readings::get_sensor_readings),
        )
        .route(
            "/sensors",
            get(sensors::list_sensors).post(sensors::create_sensor),
        )
        .route(
            "/sensors/{sensor_id}/threshold",
            get(sensors::get_threshold).put(sensors::put_threshold),
        )
        .route("/readings", get(readings::list_recent_readings))
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/{alert_id}/read", put(alerts::mark_alert_read));

    let api_routes = if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
        api_routes_base
    } else {
        let invalid = || {
            AppError::Config(ConfigError::Invalid(
                "RATE_LIMIT_PER_SECOND",
                format!(
                    "{} (burst {})",
                    config.rate_limit_per_second, config.rate_limit_burst
                ),
            ))
        };

        // `per_second` on the builder is a replenish period, not a rate
        let interval = config.rate_limit_interval().ok_or_else(invalid)?;
        tracing::info!(
            per_second = config.rate_limit_per_second,
            replenish_interval = ?interval,
            burst = config.rate_limit_burst,
            trust_proxy_headers = config.trust_proxy_headers,
            "Rate limiting configured"
        );

        let limiter = GovernorConfigBuilder::default()
            .key_extractor(ClientIpKeyExtractor {
                trust_proxy_headers: config.trust_proxy_headers,
            })
            .period(interval)
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(invalid)?;

        api_routes_base.layer(GovernorLayer {
            config: Arc::new(limiter),
        })
    }
    .layer(RequestBodyLimitLayer::new(64 * 1024));

    // Health check routes (NO rate limiting)
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Ok(Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
