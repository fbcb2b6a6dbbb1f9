use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::common::AppState;
use crate::error::AppResult;
use crate::model::{Location, LocationInput};
use crate::routes::extract::{Operator, Params, PathId, Payload};
use crate::routes::DeletedResponse;

use super::types::{LocationListResponse, LocationsQuery};

/// List locations in creation order
#[utoipa::path(
    get,
    path = "/api/locations",
    params(LocationsQuery),
    responses(
        (status = 200, description = "Locations retrieved successfully", body = LocationListResponse),
    ),
    tag = "locations"
)]
pub async fn list_locations(
    State(state): State<AppState>,
    Params(query): Params<LocationsQuery>,
) -> AppResult<Json<LocationListResponse>> {
    let page = state.engine.page(query.limit, query.offset);
    let listing = state.engine.list_locations(page).await;

    Ok(Json(LocationListResponse {
        locations: listing.items,
        total: listing.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Get a location by ID
#[utoipa::path(
    get,
    path = "/api/locations/{location_id}",
    params(("location_id" = Uuid, Path, description = "Location UUID")),
    responses(
        (status = 200, description = "Location retrieved successfully", body = Location),
        (status = 404, description = "Location not found"),
    ),
    tag = "locations"
)]
pub async fn get_location(
    State(state): State<AppState>,
    PathId(location_id): PathId,
) -> AppResult<Json<Location>> {
    Ok(Json(state.engine.get_location(location_id)?))
}

/// Create a location
#[utoipa::path(
    post,
    path = "/api/locations",
    request_body = LocationInput,
    responses(
        (status = 201, description = "Location created", body = Location),
        (status = 400, description = "Invalid location or duplicate name"),
    ),
    tag = "locations"
)]
pub async fn create_location(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    Payload(input): Payload<LocationInput>,
) -> AppResult<(StatusCode, Json<Location>)> {
    let location = state.engine.create_location(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// Replace a location's attributes
#[utoipa::path(
    put,
    path = "/api/locations/{location_id}",
    params(("location_id" = Uuid, Path, description = "Location UUID")),
    request_body = LocationInput,
    responses(
        (status = 200, description = "Location updated", body = Location),
        (status = 400, description = "Invalid location"),
        (status = 404, description = "Location not found"),
        (status = 409, description = "Stale version"),
    ),
    tag = "locations"
)]
pub async fn update_location(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    PathId(location_id): PathId,
    Payload(input): Payload<LocationInput>,
) -> AppResult<Json<Location>> {
    Ok(Json(state.engine.update_location(&ctx, location_id, input).await?))
}

/// Delete a location with no sensors
#[utoipa::path(
    delete,
    path = "/api/locations/{location_id}",
    params(("location_id" = Uuid, Path, description = "Location UUID")),
    responses(
        (status = 200, description = "Location deleted", body = DeletedResponse),
        (status = 404, description = "Location not found"),
        (status = 409, description = "Location is still referenced by a sensor"),
    ),
    tag = "locations"
)]
pub async fn delete_location(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    PathId(location_id): PathId,
) -> AppResult<Json<DeletedResponse>> {
    let deleted = state.engine.delete_location(&ctx, location_id).await?;
    Ok(Json(deleted.into()))
}
