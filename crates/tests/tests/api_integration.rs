use std::collections::HashMap;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pinplace_api::{build_router, build_state, ServiceOptions};
use pinplace_core::Settings;
use serde_json::{json, Value};
use tower::ServiceExt;

const API_KEY: &str = "test-key";

/// Every provider points at a closed local port, so each request exercises
/// the offline fallbacks.
fn offline_settings() -> Settings {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("PINPLACE_CLASSIFIER", "rules"),
        ("PINPLACE_NOMINATIM_URL", "http://127.0.0.1:9/search"),
        ("PINPLACE_ZIPPOPOTAM_URL", "http://127.0.0.1:9/us/"),
        ("PINPLACE_OLLAMA_URL", "http://127.0.0.1:9"),
        ("PINPLACE_HTTP_TIMEOUT_SECS", "2"),
    ]);
    Settings::from_lookup(|key| vars.get(key).map(|value| value.to_string()))
        .expect("offline settings should parse")
}

fn app_with(options: ServiceOptions) -> Router {
    let state = build_state(&offline_settings(), &options).expect("state should build");
    build_router(state)
}

fn app() -> Router {
    app_with(ServiceOptions {
        api_key: API_KEY.to_string(),
        ..ServiceOptions::default()
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn map_context(caller: &str, is_locked: bool, pins: Value) -> Value {
    json!({
        "map": { "name": "Road Trip", "owner_id": "owner-1", "is_locked": is_locked },
        "pins": pins,
        "caller_id": caller,
    })
}

fn sample_pins() -> Value {
    json!([
        { "id": "p1", "lat": 40.7128, "lng": -74.0060, "name": "Home Base", "created_at": "2024-05-01T12:00:00Z" },
        { "id": "p2", "lat": 40.7580, "lng": -73.9855, "name": "Office Tower", "description": "HQ", "created_at": "2024-05-02T12:00:00Z" }
    ])
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["capabilities"]["classifier"], "rules");
    assert_eq!(body["capabilities"]["routing_provider"], false);
    assert_eq!(
        body["capabilities"]["geocoders"],
        json!(["nominatim", "embedded_zip", "place_table"])
    );
}

#[tokio::test]
async fn chat_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "message": "add 92008", "context": map_context("owner-1", false, json!([])) })
                .to_string(),
        ))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_adds_zip_from_static_table() {
    let request = post(
        "/v1/chat",
        json!({ "message": "add 92008", "context": map_context("owner-1", false, json!([])) }),
    );

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["action"]["type"], "add_pin");
    assert_eq!(body["action"]["pin"]["name"], "92008");
    assert_eq!(body["action"]["pin"]["lat"], 33.1581);
    assert_eq!(body["action"]["pin"]["lng"], -117.3506);
    assert_eq!(body["data"]["source"], "zip_table");
}

#[tokio::test]
async fn chat_refuses_on_locked_map() {
    let request = post(
        "/v1/chat",
        json!({ "message": "add 92008", "context": map_context("owner-1", true, sample_pins()) }),
    );

    let body = json_body(app().oneshot(request).await.unwrap()).await;
    assert!(body["message"].as_str().unwrap().starts_with("Sorry, this map is locked"));
    assert!(body.get("action").is_none());
}

#[tokio::test]
async fn chat_delete_all_needs_creator() {
    let viewer = post(
        "/v1/chat",
        json!({ "message": "delete all pins", "context": map_context("guest", false, sample_pins()) }),
    );
    let body = json_body(app().oneshot(viewer).await.unwrap()).await;
    assert_eq!(body["message"], "Sorry, only the map creator can delete all pins.");
    assert!(body.get("action").is_none());

    let creator = post(
        "/v1/chat",
        json!({ "message": "delete all pins", "context": map_context("owner-1", false, sample_pins()) }),
    );
    let body = json_body(app().oneshot(creator).await.unwrap()).await;
    assert_eq!(body["action"], json!({ "type": "delete_all_pins", "count": 2 }));
}

#[tokio::test]
async fn chat_rejects_blank_message() {
    let request = post(
        "/v1/chat",
        json!({ "message": "   ", "context": map_context("owner-1", false, json!([])) }),
    );
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn street_address_keeps_input_text() {
    let response = app()
        .oneshot(get("/v1/geocode?q=2800%20Carlsbad%20Blvd%2C%20Carlsbad%2C%20CA%2092008"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["formatted_address"], "2800 Carlsbad Blvd, Carlsbad, CA 92008");
    assert_eq!(body["lat"], 33.1581);
    assert_eq!(body["source"], "zip_table");
}

#[tokio::test]
async fn unknown_place_is_not_found() {
    let response = app().oneshot(get("/v1/geocode?q=Qwzx%20Vbnm")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "not_found");
}

#[tokio::test]
async fn zip_route_validates_format() {
    let bad = app().oneshot(get("/v1/geocode/zip/9200")).await.unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let good = app().oneshot(get("/v1/geocode/zip/10001-1234")).await.unwrap();
    assert_eq!(good.status(), StatusCode::OK);
    assert_eq!(json_body(good).await["formatted_address"], "New York, NY 10001, USA");
}

#[tokio::test]
async fn place_search_reports_provider_outage() {
    let response = app().oneshot(get("/v1/places?q=carlsbad")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn keyless_directions_are_estimates() {
    let request = post(
        "/v1/directions",
        json!({ "start": { "lat": 0.0, "lng": 0.0 }, "end": { "lat": 0.0, "lng": 1.0 } }),
    );
    let body = json_body(app().oneshot(request).await.unwrap()).await;

    let km = body["distance_km"].as_f64().unwrap();
    let minutes = body["duration_min"].as_f64().unwrap();
    assert!((km - 111.195).abs() < 0.01);
    assert!((minutes - km * 60.0 / 50.0).abs() < 1e-9);
    assert_eq!(body["source"], "estimate");
    assert_eq!(body["duration_text"], "2 hours 13 minutes");
    assert_eq!(body["distance_text"], "111.2 km");
}

#[tokio::test]
async fn directions_reject_out_of_range_points() {
    let request = post(
        "/v1/directions",
        json!({ "start": { "lat": 95.0, "lng": 0.0 }, "end": { "lat": 0.0, "lng": 1.0 } }),
    );
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn radius_search_and_summary() {
    let radius = post(
        "/v1/spatial/radius",
        json!({ "pins": sample_pins(), "center": { "lat": 40.7128, "lng": -74.0060 }, "radius_miles": 1.0 }),
    );
    let body = json_body(app().oneshot(radius).await.unwrap()).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["matches"][0]["id"], "p1");
    assert_eq!(body["matches"][0]["distance"], 0.0);

    let invalid = post(
        "/v1/spatial/radius",
        json!({ "pins": sample_pins(), "center": { "lat": 40.7, "lng": -74.0 }, "radius_miles": -3.0 }),
    );
    assert_eq!(app().oneshot(invalid).await.unwrap().status(), StatusCode::BAD_REQUEST);

    let empty = post("/v1/spatial/summary", json!({ "pins": [] }));
    let body = json_body(app().oneshot(empty).await.unwrap()).await;
    assert_eq!(body["center"], json!({ "lat": 40.7128, "lng": -74.0060 }));
    assert_eq!(body["bounds"]["north"], 40.8);
}

#[tokio::test]
async fn csv_export_is_an_attachment() {
    let request = post(
        "/v1/export/csv",
        json!({ "map_name": "Road Trip", "pins": sample_pins() }),
    );
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"road_trip_pins.csv\""
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("Name,Description,Latitude,Longitude,Created At\n"));
    assert!(text.contains("\"Office Tower\",\"HQ\",40.758,-73.9855,2024-05-02T12:00:00.000Z"));

    let unsupported = post("/v1/export/gpx", json!({ "pins": [] }));
    assert_eq!(app().oneshot(unsupported).await.unwrap().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lock_status_for_duration_lock() {
    let request = post(
        "/v1/maps/lock-status",
        json!({ "lock_type": "duration", "duration_hours": 2 }),
    );
    let body = json_body(app().oneshot(request).await.unwrap()).await;
    assert_eq!(body["status"], "expiring");
    assert_eq!(body["time_remaining"], "2h 0m");
    assert!(body["editable_until"].is_string());

    let manual = post("/v1/maps/lock-status", json!({ "is_locked": true }));
    let body = json_body(app().oneshot(manual).await.unwrap()).await;
    assert_eq!(body["status"], "locked");
}

#[tokio::test]
async fn manual_lock_type_starts_open() {
    let fresh = post("/v1/maps/lock-status", json!({ "lock_type": "manual" }));
    let body = json_body(app().oneshot(fresh).await.unwrap()).await;
    assert_eq!(body["status"], "open");
    assert!(body.get("editable_until").is_none());

    let locked = post(
        "/v1/maps/lock-status",
        json!({ "lock_type": "manual", "is_locked": true }),
    );
    let body = json_body(app().oneshot(locked).await.unwrap()).await;
    assert_eq!(body["status"], "locked");
}

#[tokio::test]
async fn rate_limit_applies_per_ip() {
    let app = app_with(ServiceOptions {
        api_key: API_KEY.to_string(),
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max: 2,
        ..ServiceOptions::default()
    });

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/v1/geocode/zip/92008")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let limited = app.clone().oneshot(get("/v1/geocode/zip/92008")).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
