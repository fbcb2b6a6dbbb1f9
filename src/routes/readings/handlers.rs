use axum::{extract::State, http::StatusCode, Json};

use crate::common::AppState;
use crate::error::AppResult;
use crate::model::{Reading, ReadingInput};
use crate::routes::extract::{Operator, Params, Payload};

use super::types::{IngestionResponse, LatestQuery, ReadingListResponse, ReadingsQuery};

/// Reading history, newest sample first
#[utoipa::path(
    get,
    path = "/api/readings",
    params(ReadingsQuery),
    responses(
        (status = 200, description = "Readings retrieved successfully", body = ReadingListResponse),
        (status = 400, description = "Invalid query parameters"),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(state): State<AppState>,
    Params(query): Params<ReadingsQuery>,
) -> AppResult<Json<ReadingListResponse>> {
    let filter = query.filter()?;
    let page = state.engine.page(query.limit, query.offset);
    let listing = state.engine.list_readings(&filter, page).await;

    Ok(Json(ReadingListResponse {
        readings: listing.items,
        total: listing.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Most recent reading of each active sensor
#[utoipa::path(
    get,
    path = "/api/readings/latest",
    params(LatestQuery),
    responses(
        (status = 200, description = "Latest readings retrieved successfully", body = Vec<Reading>),
        (status = 400, description = "Invalid sensor id list"),
    ),
    tag = "readings"
)]
pub async fn latest_readings(
    State(state): State<AppState>,
    Params(query): Params<LatestQuery>,
) -> AppResult<Json<Vec<Reading>>> {
    let sensor_ids = query.sensor_ids()?;
    Ok(Json(
        state
            .engine
            .latest_readings_per_sensor(sensor_ids.as_deref())
            .await,
    ))
}

/// Ingest a reading and evaluate it against the sensor's thresholds
#[utoipa::path(
    post,
    path = "/api/readings",
    request_body = ReadingInput,
    responses(
        (status = 201, description = "Reading stored", body = IngestionResponse),
        (status = 400, description = "Invalid reading"),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "readings"
)]
pub async fn submit_reading(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    Payload(input): Payload<ReadingInput>,
) -> AppResult<(StatusCode, Json<IngestionResponse>)> {
    let ingestion = state.engine.submit_reading(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(ingestion.into())))
}
