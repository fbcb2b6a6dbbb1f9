use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::common::AppState;
use crate::model::EntityKind;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub deployment: String,
    pub locations: usize,
    pub sensors: usize,
    pub readings: usize,
    pub alerts: usize,
}

/// Health check endpoint
///
/// Returns 200 OK with entity counts while the service is running.
/// This endpoint is not rate-limited and suitable for Kubernetes liveness checks.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = state.engine.store().counts();
    let count = |kind: EntityKind| counts.get(&kind).copied().unwrap_or_default();

    Json(HealthResponse {
        status: "ok",
        deployment: format!("{:?}", state.config.deployment).to_lowercase(),
        locations: count(EntityKind::Location),
        sensors: count(EntityKind::Sensor),
        readings: count(EntityKind::Reading),
        alerts: count(EntityKind::Alert),
    })
}
