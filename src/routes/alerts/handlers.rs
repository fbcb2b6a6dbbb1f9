use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::common::AppState;
use crate::error::AppResult;
use crate::model::{Alert, ManualAlertInput};
use crate::query::AlertSummary;
use crate::routes::extract::{Operator, Params, PathId, Payload};

use super::types::{AlertListResponse, AlertStatusUpdate, AlertsQuery};

/// List alerts, newest first
#[utoipa::path(
    get,
    path = "/api/alerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Alerts retrieved successfully", body = AlertListResponse),
        (status = 400, description = "Invalid query parameters"),
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Params(query): Params<AlertsQuery>,
) -> AppResult<Json<AlertListResponse>> {
    let page = state.engine.page(query.limit, query.offset);
    let listing = state.engine.list_alerts(&query.filter(), page).await;

    Ok(Json(AlertListResponse {
        alerts: listing.items,
        total: listing.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Alert counts by status and unresolved severity
#[utoipa::path(
    get,
    path = "/api/alerts/summary",
    responses(
        (status = 200, description = "Summary computed", body = AlertSummary),
    ),
    tag = "alerts"
)]
pub async fn alert_summary(State(state): State<AppState>) -> AppResult<Json<AlertSummary>> {
    Ok(Json(state.engine.alert_summary().await))
}

/// Get an alert by ID
#[utoipa::path(
    get,
    path = "/api/alerts/{alert_id}",
    params(("alert_id" = Uuid, Path, description = "Alert UUID")),
    responses(
        (status = 200, description = "Alert retrieved successfully", body = Alert),
        (status = 404, description = "Alert not found"),
    ),
    tag = "alerts"
)]
pub async fn get_alert(
    State(state): State<AppState>,
    PathId(alert_id): PathId,
) -> AppResult<Json<Alert>> {
    Ok(Json(state.engine.get_alert(alert_id)?))
}

/// Raise an alert by hand
#[utoipa::path(
    post,
    path = "/api/alerts",
    request_body = ManualAlertInput,
    responses(
        (status = 201, description = "Alert raised", body = Alert),
        (status = 400, description = "Invalid alert or unknown sensor"),
    ),
    tag = "alerts"
)]
pub async fn create_alert(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    Payload(input): Payload<ManualAlertInput>,
) -> AppResult<(StatusCode, Json<Alert>)> {
    let alert = state.engine.raise_alert(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

/// Move an alert through its lifecycle
///
/// Only `status` may be sent. Allowed moves are active → acknowledged,
/// active → resolved and acknowledged → resolved.
#[utoipa::path(
    put,
    path = "/api/alerts/{alert_id}",
    params(("alert_id" = Uuid, Path, description = "Alert UUID")),
    request_body = AlertStatusUpdate,
    responses(
        (status = 200, description = "Alert transitioned", body = Alert),
        (status = 400, description = "Body contains fields other than status"),
        (status = 404, description = "Alert not found"),
        (status = 409, description = "Transition not allowed"),
    ),
    tag = "alerts"
)]
pub async fn update_alert(
    State(state): State<AppState>,
    Operator(ctx): Operator,
    PathId(alert_id): PathId,
    Payload(update): Payload<AlertStatusUpdate>,
) -> AppResult<Json<Alert>> {
    Ok(Json(
        state.engine.transition_alert(&ctx, alert_id, update.status).await?,
    ))
}
