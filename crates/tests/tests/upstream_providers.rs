use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pinplace_agents::{build_http_client, MapAssistant};
use pinplace_core::{
    AssistantContext, BotAction, GeocodeSource, MapContext, Point, RouteSource, Settings,
};
use pinplace_directions::{DirectionsResolver, RoutePlanner};
use pinplace_geocoding::{Geocoder, GeocodingResolver};
use pinplace_observability::AppMetrics;
use serde_json::{json, Value};

const USER_AGENT: &str = "pinplace-tests/1.0";

async fn nominatim(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if headers.get("user-agent").and_then(|v| v.to_str().ok()) != Some(USER_AGENT) {
        return (StatusCode::FORBIDDEN, Json(json!([])));
    }
    let query = params.get("q").map(String::as_str).unwrap_or_default();
    let body = if query.to_lowercase().contains("carlsbad") {
        json!([
            {
                "place_id": 2211,
                "lat": "33.1580933",
                "lon": "-117.3505939",
                "display_name": "Carlsbad, San Diego County, California, United States",
                "name": "Carlsbad",
                "class": "place",
                "type": "city",
                "address": { "city": "Carlsbad", "country": "United States" }
            },
            {
                "place_id": 9001,
                "lat": "33.16",
                "lon": "-117.35",
                "display_name": "Carlsbad Coffee, Carlsbad Village Drive",
                "name": "Carlsbad Coffee",
                "class": "amenity",
                "type": "cafe",
                "address": { "country": "United States" }
            }
        ])
    } else {
        json!([])
    };
    (StatusCode::OK, Json(body))
}

async fn zippopotam(Path(zip): Path<String>) -> (StatusCode, Json<Value>) {
    if zip != "92008" {
        return (StatusCode::NOT_FOUND, Json(json!({})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "post code": "92008",
            "country": "United States",
            "places": [{
                "place name": "Carlsbad",
                "state abbreviation": "CA",
                "latitude": "33.1605",
                "longitude": "-117.3267"
            }]
        })),
    )
}

async fn openroute(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("authorization").is_none() {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    let Some(coordinates) = body["coordinates"].as_array().filter(|c| c.len() == 2) else {
        return (StatusCode::BAD_REQUEST, Json(json!({})));
    };
    (
        StatusCode::OK,
        Json(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "summary": { "distance": 42000.0, "duration": 4500.0 } },
                "geometry": { "type": "LineString", "coordinates": coordinates }
            }]
        })),
    )
}

async fn ollama(Json(body): Json<Value>) -> Json<Value> {
    let prompt = body["prompt"].as_str().unwrap_or_default();
    let intent = if prompt.contains("Carlsbad") {
        json!({
            "action": "geocode",
            "parameters": { "location": "Carlsbad" },
            "response_text": "Dropping a pin on Carlsbad."
        })
    } else {
        json!({ "action": "chat", "response_text": "Ask me about your pins." })
    };
    Json(json!({ "model": body["model"], "response": intent.to_string(), "done": true }))
}

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/search", get(nominatim))
        .route("/us/:zip", get(zippopotam))
        .route("/route", post(openroute))
        .route("/api/generate", post(ollama));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn stub_settings(addr: SocketAddr) -> Settings {
    let base = format!("http://{addr}");
    let vars: HashMap<&str, String> = HashMap::from([
        ("PINPLACE_USER_AGENT", USER_AGENT.to_string()),
        ("PINPLACE_NOMINATIM_URL", format!("{base}/search")),
        ("PINPLACE_ZIPPOPOTAM_URL", format!("{base}/us/")),
        ("PINPLACE_OPENROUTE_URL", format!("{base}/route")),
        ("PINPLACE_OPENROUTE_KEY", "route-key".to_string()),
        ("PINPLACE_CLASSIFIER", "ollama".to_string()),
        ("PINPLACE_OLLAMA_URL", base.clone()),
        ("PINPLACE_HTTP_TIMEOUT_SECS", "5".to_string()),
    ]);
    Settings::from_lookup(|key| vars.get(key).cloned()).expect("stub settings should parse")
}

struct Stack {
    geocoder: Arc<GeocodingResolver>,
    planner: Arc<DirectionsResolver>,
    assistant: MapAssistant,
    metrics: Arc<AppMetrics>,
}

async fn stack() -> Stack {
    let settings = stub_settings(spawn_upstream().await);
    let client = build_http_client(settings.http_timeout, &settings.geocoding.user_agent).unwrap();
    let geocoder = Arc::new(GeocodingResolver::from_settings(&settings.geocoding, client.clone()).unwrap());
    let planner = Arc::new(DirectionsResolver::from_settings(&settings.directions, client.clone()));
    let classifier = pinplace_inference::from_settings(&settings.inference, client);
    let metrics = Arc::new(AppMetrics::default());
    let assistant = MapAssistant::new(geocoder.clone(), planner.clone(), classifier, metrics.clone());
    Stack {
        geocoder,
        planner,
        assistant,
        metrics,
    }
}

#[tokio::test]
async fn address_chain_prefers_nominatim() {
    let stack = stack().await;
    let result = stack.geocoder.resolve_address("Carlsbad, CA").await.unwrap();

    assert_eq!(result.source, GeocodeSource::Nominatim);
    assert_eq!(result.lat, 33.1580933);
    assert_eq!(result.lng, -117.3505939);
    assert_eq!(result.place_id.as_deref(), Some("2211"));
}

#[tokio::test]
async fn empty_nominatim_answer_falls_through_to_place_table() {
    let stack = stack().await;
    let result = stack.geocoder.resolve_address("Wrigley Field").await.unwrap();
    assert_eq!(result.source, GeocodeSource::PlaceTable);
}

#[tokio::test]
async fn place_search_drops_non_place_results() {
    let stack = stack().await;
    let places = stack.geocoder.search_places("carlsbad", 5).await.unwrap();

    assert_eq!(places.len(), 1);
    assert_eq!(places[0].name, "Carlsbad");
    assert_eq!(places[0].country, "United States");

    let nothing = stack.geocoder.search_places("   ", 5).await.unwrap();
    assert!(nothing.is_empty());
}

#[tokio::test]
async fn zip_lookup_uses_live_service_first() {
    let stack = stack().await;
    let result = stack.geocoder.resolve_zip("92008").await.unwrap();

    assert_eq!(result.source, GeocodeSource::Zippopotam);
    assert_eq!(result.formatted_address, "Carlsbad, CA 92008, USA");
    assert_eq!(result.lat, 33.1605);
}

#[tokio::test]
async fn zip_missing_upstream_falls_back_to_table() {
    let stack = stack().await;
    let result = stack.geocoder.resolve_zip("10001").await.unwrap();

    assert_eq!(result.source, GeocodeSource::ZipTable);
    assert_eq!(result.formatted_address, "New York, NY 10001, USA");
}

#[tokio::test]
async fn routing_provider_result_is_used() {
    let stack = stack().await;
    let result = stack
        .planner
        .route(Point::new(33.1581, -117.3506), Point::new(32.7157, -117.1611))
        .await;

    assert_eq!(result.source, RouteSource::Provider);
    assert_eq!(result.distance_km, 42.0);
    assert_eq!(result.duration_min, 75.0);
    assert!(result.route.is_some());
}

#[tokio::test]
async fn assistant_adds_pin_from_model_intent() {
    let stack = stack().await;
    let context = AssistantContext {
        map: MapContext {
            name: "Coast".to_string(),
            owner_id: "owner-1".to_string(),
            is_locked: false,
            editable_until: None,
        },
        pins: Vec::new(),
        caller_id: Some("owner-1".to_string()),
    };

    let response = stack
        .assistant
        .handle_message("put a pin on Carlsbad", &context)
        .await;

    assert_eq!(response.message, "Dropping a pin on Carlsbad.");
    let Some(BotAction::AddPin { pin }) = response.action else {
        panic!("expected add_pin, got {:?}", response.action);
    };
    assert_eq!(pin.name, "Carlsbad");
    assert_eq!(pin.lat, 33.1580933);
    assert_eq!(response.data["source"], "nominatim");

    let snapshot = stack.metrics.snapshot();
    assert_eq!(snapshot.requests_total, 1);
    assert_eq!(snapshot.classifier_failures_total, 0);
    assert_eq!(snapshot.fallback_total, 0);
}
