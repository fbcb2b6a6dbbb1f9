use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::common::AppState;
use crate::error::AppResult;
use crate::model::{Sensor, SensorInput};
use crate::routes::extract::{Operator, Params, PathId, Payload};
use crate::routes::DeletedResponse;

use super::types::{SensorListResponse, SensorsQuery};

/// List sensors
#[utoipa::path(
    get,
    path = "/api/sensors",
    params(SensorsQuery),
    responses(
        (status = 200, description = "Sensors retrieved successfully", body = SensorListResponse),
        (status = 400, description = "Invalid query parameters"),
    ),
    tag = "sensors"
)]
pub async fn list_sensors(
    State(state): State<AppState>,
    Params(query): Params<SensorsQuery>,
) -> AppResult<Json<SensorListResponse>> {
    let page = state.engine.page(query.limit, query.offset);
    let listing = state.engine.list_sensors(&query.filter(), page).await;

    Ok(Json(SensorListResponse {
        sensors: listing.items,
        total: listing.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Get a sensor by ID
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}",
    params(("sensor_id" = Uuid, Path, description = "Sensor UUID")),
    responses(
        (status = 200, description = "Sensor retrieved successfully", body = Sensor),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "sensors"
)]
pub async fn get_sensor(
    State(state): State<AppState>,
    PathId(sensor_id): PathId,
) -> AppResult<Json<Sensor>> {
    Ok(Json(state.engine.get_sensor(sensor_id)?))
}

/// Register a sensor
#[utoipa::path(
    post,
    path = "/api/sensors",
    request_body = SensorInput,
    responses(
        (status = 201, description = "Sensor created", body = Sensor),
        (status = 400, description = "Invalid sensor, unknown location or duplicate device_id"),
    ),
    tag = "sensors"
)]
pub async fn create_sensor(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    Payload(input): Payload<SensorInput>,
) -> AppResult<(StatusCode, Json<Sensor>)> {
    let sensor = state.engine.create_sensor(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(sensor)))
}

/// Replace a sensor's attributes
#[utoipa::path(
    put,
    path = "/api/sensors/{sensor_id}",
    params(("sensor_id" = Uuid, Path, description = "Sensor UUID")),
    request_body = SensorInput,
    responses(
        (status = 200, description = "Sensor updated", body = Sensor),
        (status = 400, description = "Invalid sensor"),
        (status = 404, description = "Sensor not found"),
        (status = 409, description = "Stale version"),
    ),
    tag = "sensors"
)]
pub async fn update_sensor(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    PathId(sensor_id): PathId,
    Payload(input): Payload<SensorInput>,
) -> AppResult<Json<Sensor>> {
    Ok(Json(state.engine.update_sensor(&ctx, sensor_id, input).await?))
}

/// Delete a sensor and its readings
#[utoipa::path(
    delete,
    path = "/api/sensors/{sensor_id}",
    params(("sensor_id" = Uuid, Path, description = "Sensor UUID")),
    responses(
        (status = 200, description = "Sensor deleted", body = DeletedResponse),
        (status = 404, description = "Sensor not found"),
        (status = 409, description = "Sensor still has unresolved alerts"),
    ),
    tag = "sensors"
)]
pub async fn delete_sensor(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    PathId(sensor_id): PathId,
) -> AppResult<Json<DeletedResponse>> {
    let deleted = state.engine.delete_sensor(&ctx, sensor_id).await?;
    Ok(Json(deleted.into()))
}
