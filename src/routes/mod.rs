pub mod alerts;
pub mod extract;
pub mod health;
pub mod locations;
pub mod readings;
pub mod sensors;

use axum::{
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::{OpenApi, ToSchema};
use utoipa_scalar::{Scalar, Servable};
use uuid::Uuid;

use crate::common::AppState;
use crate::model::EntityKind;
use crate::services::rate_limit::OperatorKeyExtractor;
use crate::store::Deleted;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedResponse {
    pub kind: EntityKind,
    pub id: Uuid,
    /// Readings removed together with a deleted sensor
    pub cascaded_readings: usize,
}

impl From<Deleted> for DeletedResponse {
    fn from(d: Deleted) -> Self {
        Self {
            kind: d.kind,
            id: d.id,
            cascaded_readings: d.cascaded_readings,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        locations::list_locations,
        locations::get_location,
        locations::create_location,
        locations::update_location,
        locations::delete_location,
        sensors::list_sensors,
        sensors::get_sensor,
        sensors::create_sensor,
        sensors::update_sensor,
        sensors::delete_sensor,
        alerts::list_alerts,
        alerts::alert_summary,
        alerts::get_alert,
        alerts::create_alert,
        alerts::update_alert,
        readings::list_readings,
        readings::latest_readings,
        readings::submit_reading,
    ),
    components(
        schemas(
            health::HealthResponse,
            DeletedResponse,
            crate::model::Location,
            crate::model::LocationInput,
            crate::model::Sensor,
            crate::model::SensorInput,
            crate::model::SensorType,
            crate::model::Reading,
            crate::model::ReadingInput,
            crate::model::Alert,
            crate::model::AlertSeverity,
            crate::model::AlertStatus,
            crate::model::AlertType,
            crate::model::ThresholdBound,
            crate::model::ManualAlertInput,
            crate::query::AlertSummary,
            crate::query::StatusCounts,
            crate::query::SeverityCounts,
            locations::LocationListResponse,
            sensors::SensorListResponse,
            alerts::AlertListResponse,
            alerts::AlertStatusUpdate,
            readings::ReadingListResponse,
            readings::IngestionResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "locations", description = "Physical locations hosting sensors"),
        (name = "sensors", description = "Sensor registry and thresholds"),
        (name = "alerts", description = "Alert lifecycle"),
        (name = "readings", description = "Reading ingestion and history"),
    ),
    info(
        title = "Sensor Monitor API",
        description = "Sensor alert lifecycle and consistency service",
        version = "0.1.0"
    )
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
    } else {
        tracing::info!(
            rate = %format!("{}/s burst {}", config.rate_limit_per_second, config.rate_limit_burst),
            "Rate limiting configured"
        );
    }

    let api_routes_base = Router::new()
        .route(
            "/locations",
            get(locations::list_locations).post(locations::create_location),
        )
        .route(
            "/locations/{location_id}",
            get(locations::get_location)
                .put(locations::update_location)
                .delete(locations::delete_location),
        )
        .route(
            "/sensors",
            get(sensors::list_sensors).post(sensors::create_sensor),
        )
        .route(
            "/sensors/{sensor_id}",
            get(sensors::get_sensor)
                .put(sensors::update_sensor)
                .delete(sensors::delete_sensor),
        )
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/alerts/summary", get(alerts::alert_summary))
        .route(
            "/alerts/{alert_id}",
            get(alerts::get_alert).put(alerts::update_alert),
        )
        .route(
            "/readings",
            get(readings::list_readings).post(readings::submit_reading),
        )
        .route("/readings/latest", get(readings::latest_readings));

    // Conditionally apply rate limiting
    let api_routes = if config.disable_rate_limiting {
        api_routes_base
    } else {
        let limiter = GovernorConfigBuilder::default()
            .key_extractor(OperatorKeyExtractor)
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish()
            .expect("Failed to create rate limiter");

        api_routes_base.layer(GovernorLayer {
            config: Arc::new(limiter),
        })
    }
    .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB body limit

    // Health check routes (NO rate limiting)
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Router::new()
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
        .with_state(state)
}
