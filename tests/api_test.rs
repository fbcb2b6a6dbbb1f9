//! HTTP surface tests against the in-memory router.
//!
//! Run with: cargo test --test api_test

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use sensor_monitor::common::AppState;
use sensor_monitor::config::Config;
use sensor_monitor::routes::build_router;

fn app() -> Router {
    let config = Config {
        disable_rate_limiting: true,
        ..Config::default()
    };
    build_router(AppState::in_memory(config))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-operator", "alice");
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed_sensor(app: &Router) -> (String, String) {
    let (status, location) = call(
        app,
        Method::POST,
        "/api/locations",
        Some(json!({ "name": "Server room", "building": "B1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let location_id = location["id"].as_str().unwrap().to_string();

    let (status, sensor) = call(
        app,
        Method::POST,
        "/api/sensors",
        Some(json!({
            "name": "S",
            "sensor_type": "temperature",
            "device_id": "dev-1",
            "location_id": location_id,
            "unit": "°C",
            "alert_threshold_min": 10.0,
            "alert_threshold_max": 30.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sensor["is_active"], true);
    assert_eq!(sensor["version"], 1);
    (location_id, sensor["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn healthz_reports_counts() {
    let app = app();
    seed_sensor(&app).await;

    let (status, body) = call(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sensors"], 1);
    assert_eq!(body["locations"], 1);
}

#[tokio::test]
async fn alert_lifecycle_over_http() {
    let app = app();
    let (_, sensor_id) = seed_sensor(&app).await;

    let (status, ingestion) = call(
        &app,
        Method::POST,
        "/api/readings",
        Some(json!({ "sensor_id": sensor_id, "value": 35.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let alert = &ingestion["alert"];
    assert_eq!(alert["severity"], "medium");
    assert_eq!(alert["status"], "active");
    assert_eq!(alert["threshold_value"], 30.0);
    assert_eq!(alert["actual_value"], 35.0);
    let alert_uri = format!("/api/alerts/{}", alert["id"].as_str().unwrap());

    let (status, acked) = call(
        &app,
        Method::PUT,
        &alert_uri,
        Some(json!({ "status": "acknowledged" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(acked["status"], "acknowledged");
    assert!(acked["acknowledged_at"].is_string());
    assert_eq!(acked["acknowledged_by"], "alice");

    let (status, resolved) = call(
        &app,
        Method::PUT,
        &alert_uri,
        Some(json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(resolved["resolved_at"].is_string());

    let (status, error) = call(
        &app,
        Method::PUT,
        &alert_uri,
        Some(json!({ "status": "active" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["kind"], "invalid_transition");

    let (status, listing) = call(
        &app,
        Method::GET,
        &format!("/api/alerts?status=active&sensor_id={sensor_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["alerts"], json!([]));
    assert_eq!(listing["total"], 0);

    let (_, summary) = call(&app, Method::GET, "/api/alerts/summary", None).await;
    assert_eq!(summary["by_status"]["resolved"], 1);
}

#[tokio::test]
async fn alert_update_rejects_fields_other_than_status() {
    let app = app();
    let (_, sensor_id) = seed_sensor(&app).await;
    let (_, ingestion) = call(
        &app,
        Method::POST,
        "/api/readings",
        Some(json!({ "sensor_id": sensor_id, "value": 1.0 })),
    )
    .await;
    let alert_uri = format!("/api/alerts/{}", ingestion["alert"]["id"].as_str().unwrap());

    let (status, error) = call(
        &app,
        Method::PUT,
        &alert_uri,
        Some(json!({ "status": "resolved", "resolved_at": "2020-01-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "validation_error");

    let (_, alert) = call(&app, Method::GET, &alert_uri, None).await;
    assert_eq!(alert["status"], "active");
    assert!(alert["resolved_at"].is_null());
}

#[tokio::test]
async fn error_kinds_map_to_status_codes() {
    let app = app();
    let (location_id, sensor_id) = seed_sensor(&app).await;

    // Referenced location
    let (status, error) = call(
        &app,
        Method::DELETE,
        &format!("/api/locations/{location_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["kind"], "referential_integrity_error");

    // Unknown sensor for ingestion
    let (status, error) = call(
        &app,
        Method::POST,
        "/api/readings",
        Some(json!({ "sensor_id": uuid::Uuid::new_v4(), "value": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["kind"], "not_found");

    // Inverted thresholds
    let (status, error) = call(
        &app,
        Method::PUT,
        &format!("/api/sensors/{sensor_id}"),
        Some(json!({
            "name": "S",
            "sensor_type": "temperature",
            "device_id": "dev-1",
            "location_id": location_id,
            "alert_threshold_min": 40.0,
            "alert_threshold_max": 30.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "validation_error");

    // Stale version
    let (status, error) = call(
        &app,
        Method::PUT,
        &format!("/api/sensors/{sensor_id}"),
        Some(json!({
            "name": "S2",
            "sensor_type": "temperature",
            "device_id": "dev-1",
            "location_id": location_id,
            "version": 7
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["kind"], "conflict");

    // Unknown field
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/locations",
        Some(json!({ "name": "X", "colour": "red" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sensor_listing_pages_and_filters() {
    let app = app();
    let (location_id, _) = seed_sensor(&app).await;
    for (device, kind) in [("dev-2", "humidity"), ("dev-3", "humidity")] {
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/sensors",
            Some(json!({
                "name": device,
                "sensor_type": kind,
                "device_id": device,
                "location_id": location_id
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = call(&app, Method::GET, "/api/sensors?limit=1&offset=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["offset"], 1);
    assert_eq!(page["sensors"][0]["device_id"], "dev-2");

    let (_, humid) = call(&app, Method::GET, "/api/sensors?sensor_type=humidity", None).await;
    assert_eq!(humid["total"], 2);

    let (status, _) = call(&app, Method::GET, "/api/sensors?sensor_type=sonar", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn latest_readings_and_history() {
    let app = app();
    let (_, sensor_id) = seed_sensor(&app).await;
    for (value, ts) in [(20.0, "2026-01-01T10:00:00Z"), (22.0, "2026-01-01T11:00:00Z")] {
        call(
            &app,
            Method::POST,
            "/api/readings",
            Some(json!({ "sensor_id": sensor_id, "value": value, "timestamp": ts })),
        )
        .await;
    }

    let (status, latest) = call(&app, Method::GET, "/api/readings/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest.as_array().unwrap().len(), 1);
    assert_eq!(latest[0]["value"], 22.0);

    let (_, history) = call(
        &app,
        Method::GET,
        &format!("/api/readings?sensor_id={sensor_id}&end=2026-01-01T10:30:00Z"),
        None,
    )
    .await;
    assert_eq!(history["total"], 1);
    assert_eq!(history["readings"][0]["value"], 20.0);
}

#[tokio::test]
async fn malformed_ids_are_validation_errors() {
    let app = app();
    for uri in ["/api/sensors/not-a-uuid", "/api/locations/42", "/api/alerts/xyz"] {
        let (status, error) = call(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error["kind"], "validation_error", "{uri}");
        assert!(error["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn location_replace_over_http() {
    let app = app();
    let (location_id, _) = seed_sensor(&app).await;
    let uri = format!("/api/locations/{location_id}");
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/locations",
        Some(json!({ "name": "Loading dock" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "name": "loading DOCK" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "validation_error");

    let (status, replaced) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "name": "Comms room", "floor": "2", "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["version"], 2);
    assert_eq!(replaced["floor"], "2");
    assert!(replaced["building"].is_null());

    let (status, error) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "name": "Comms room", "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["kind"], "conflict");

    let (_, fetched) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(fetched["name"], "Comms room");
    assert!(fetched["building"].is_null());

    let (_, listing) = call(&app, Method::GET, "/api/locations", None).await;
    assert_eq!(listing["total"], 2);
    assert_eq!(listing["locations"][0]["name"], "Comms room");
}
