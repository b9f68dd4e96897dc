use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::common::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
    /// Deployment label (`local`, `dev`, `stage`, `prod`)
    pub deployment: String,
}

/// Liveness check
///
/// Answers without contacting the backend, and is not rate-limited.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is running", body = Liveness),
    ),
    tag = "health"
)]
pub async fn healthz(State(state): State<AppState>) -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        deployment: format!("{:?}", state.config.deployment).to_lowercase(),
    })
}
