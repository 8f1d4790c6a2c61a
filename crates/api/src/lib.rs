mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Json, Path, Query, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use chrono::{DateTime, Utc};
use pinplace_agents::{build_http_client, MapAssistant};
use pinplace_core::export::{export_file_name, to_csv, to_kml, CSV_CONTENT_TYPE, KML_CONTENT_TYPE};
use pinplace_core::lock::{editable_until, lock_state, LockState, LockType};
use pinplace_core::spatial::{bounds, centroid, find_in_radius};
use pinplace_core::{
    AssistantContext, Bounds, DirectionsResult, GeocodeResult, LookupError, MapDefaults, Pin,
    PinWithDistance, Point, ProviderError, Settings, SpatialQuery, ValidationError,
};
use pinplace_directions::{format_distance, format_duration, DirectionsResolver, RoutePlanner};
use pinplace_geocoding::{is_zip, Geocoder, GeocodingResolver, DEFAULT_SEARCH_LIMIT};
use pinplace_observability::{AppMetrics, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use crate::rate_limit::SlidingWindowLimiter;

const MAX_BODY_BYTES: usize = 256 * 1024;
const MAX_MESSAGE_LEN: usize = 2_000;
const DEFAULT_API_KEY: &str = "dev-pinplace-key";
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX: usize = 60;

/// Service-shell settings that the core libraries never see.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub api_key: String,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        }
    }
}

impl ServiceOptions {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str| {
            env::var(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            api_key: var("PINPLACE_API_KEY").unwrap_or(defaults.api_key),
            rate_limit_window: var("PINPLACE_RATE_LIMIT_WINDOW_SECONDS")
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: var("PINPLACE_RATE_LIMIT_MAX")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
            allowed_origins: var("PINPLACE_ALLOWED_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(|origin| origin.trim().trim_end_matches('/').to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.allowed_origins),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<MapAssistant>,
    pub geocoder: Arc<GeocodingResolver>,
    pub planner: Arc<DirectionsResolver>,
    pub metrics: Arc<AppMetrics>,
    pub map_defaults: MapDefaults,
    pub api_key: String,
    pub limiter: SlidingWindowLimiter,
    pub allowed_origins: Arc<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    classifier: &'static str,
    geocoders: Vec<&'static str>,
    routing_provider: bool,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    context: AssistantContext,
}

#[derive(Debug, Deserialize)]
struct GeocodeQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Deserialize)]
struct PlacesQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRequest {
    start: Point,
    end: Point,
}

#[derive(Debug, Serialize)]
struct DirectionsResponse {
    #[serde(flatten)]
    directions: DirectionsResult,
    duration_text: String,
    distance_text: String,
}

#[derive(Debug, Deserialize)]
struct RadiusRequest {
    #[serde(default)]
    pins: Vec<Pin>,
    center: Point,
    radius_miles: f64,
}

#[derive(Debug, Serialize)]
struct RadiusResponse {
    count: usize,
    matches: Vec<PinWithDistance>,
}

#[derive(Debug, Deserialize)]
struct PinsRequest {
    #[serde(default)]
    pins: Vec<Pin>,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    count: usize,
    center: Point,
    bounds: Bounds,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    #[serde(default = "default_map_name")]
    map_name: String,
    #[serde(default)]
    pins: Vec<Pin>,
}

fn default_map_name() -> String {
    "pinplace".to_string()
}

#[derive(Debug, Deserialize)]
struct LockStatusRequest {
    #[serde(default)]
    is_locked: bool,
    editable_until: Option<DateTime<Utc>>,
    lock_type: Option<LockType>,
    duration_hours: Option<f64>,
    lock_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct LockStatusResponse {
    #[serde(flatten)]
    state: LockState,
    #[serde(skip_serializing_if = "Option::is_none")]
    editable_until: Option<DateTime<Utc>>,
}

pub fn build_state(settings: &Settings, options: &ServiceOptions) -> Result<ApiState> {
    let metrics = AppMetrics::shared();
    let client = build_http_client(settings.http_timeout, &settings.geocoding.user_agent)?;

    let geocoder = Arc::new(
        GeocodingResolver::from_settings(&settings.geocoding, client.clone())
            .context("failed to initialize geocoding")?,
    );
    let planner = Arc::new(DirectionsResolver::from_settings(
        &settings.directions,
        client.clone(),
    ));
    let classifier = pinplace_inference::from_settings(&settings.inference, client);

    let assistant = Arc::new(MapAssistant::new(
        geocoder.clone(),
        planner.clone(),
        classifier,
        metrics.clone(),
    ));

    Ok(ApiState {
        assistant,
        geocoder,
        planner,
        metrics,
        map_defaults: settings.map_defaults,
        api_key: options.api_key.clone(),
        limiter: SlidingWindowLimiter::new(options.rate_limit_window, options.rate_limit_max),
        allowed_origins: Arc::new(options.allowed_origins.clone()),
    })
}

pub fn build_app() -> Result<Router> {
    let settings = Settings::from_env().context("invalid PINPLACE_* configuration")?;
    let state = build_state(&settings, &ServiceOptions::from_env())?;
    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/geocode", get(geocode))
        .route("/v1/geocode/zip/:zip", get(geocode_zip))
        .route("/v1/places", get(places))
        .route("/v1/directions", post(directions))
        .route("/v1/spatial/radius", post(spatial_radius))
        .route("/v1/spatial/summary", post(spatial_summary))
        .route("/v1/export/:format", post(export_pins))
        .route("/v1/maps/lock-status", post(map_lock_status))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "message": message.into(),
        })),
    )
        .into_response()
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            classifier: state.assistant.classifier_name(),
            geocoders: state.geocoder.strategy_names(),
            routing_provider: state.planner.has_provider(),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn chat(State(state): State<ApiState>, Json(request): Json<ChatRequest>) -> Response {
    let message = request.message.trim();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_message", "message is required");
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_message",
            format!("message is limited to {MAX_MESSAGE_LEN} characters"),
        );
    }

    let response = state.assistant.handle_message(message, &request.context).await;
    (StatusCode::OK, Json(response)).into_response()
}

fn geocode_response(state: &ApiState, resolved: Result<GeocodeResult, LookupError>) -> Response {
    match resolved {
        Ok(result) => {
            if result.source.is_static() {
                state.metrics.inc_fallback(result.source.as_str());
            }
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(err) => error_response(StatusCode::NOT_FOUND, "not_found", err.to_string()),
    }
}

async fn geocode(State(state): State<ApiState>, Query(query): Query<GeocodeQuery>) -> Response {
    let text = query.q.trim();
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_query", "q is required");
    }
    state.metrics.inc_request();
    let resolved = state.geocoder.resolve_address(text).await;
    geocode_response(&state, resolved)
}

async fn geocode_zip(State(state): State<ApiState>, Path(zip): Path<String>) -> Response {
    if !is_zip(zip.trim()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_zip",
            "expected a 5-digit ZIP or ZIP+4",
        );
    }
    state.metrics.inc_request();
    let resolved = state.geocoder.resolve_zip(zip.trim()).await;
    geocode_response(&state, resolved)
}

async fn places(State(state): State<ApiState>, Query(query): Query<PlacesQuery>) -> Response {
    state.metrics.inc_request();
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

    match state.geocoder.search_places(&query.q, limit).await {
        Ok(results) => (StatusCode::OK, Json(json!({ "results": results }))).into_response(),
        Err(err @ ProviderError::NotConfigured { .. }) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "search_unavailable", err.to_string())
        }
        Err(err) => {
            warn!(error = %err, "place search failed");
            state.metrics.inc_provider_failure(err.provider());
            error_response(StatusCode::BAD_GATEWAY, "provider_unavailable", err.to_string())
        }
    }
}

fn invalid_input(err: ValidationError) -> Response {
    error_response(StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
}

async fn directions(
    State(state): State<ApiState>,
    Json(request): Json<DirectionsRequest>,
) -> Response {
    if let Err(err) = request.start.validate().and(request.end.validate()) {
        return invalid_input(err);
    }
    state.metrics.inc_request();

    let directions = state.planner.route(request.start, request.end).await;
    if directions.source == pinplace_core::RouteSource::Estimate {
        state.metrics.inc_fallback("route_estimate");
    }
    let payload = DirectionsResponse {
        duration_text: format_duration(directions.duration_min),
        distance_text: format_distance(directions.distance_km),
        directions,
    };
    (StatusCode::OK, Json(payload)).into_response()
}

async fn spatial_radius(Json(request): Json<RadiusRequest>) -> Response {
    if let Err(err) = request.center.validate() {
        return invalid_input(err);
    }
    if !request.radius_miles.is_finite() || request.radius_miles <= 0.0 {
        return invalid_input(ValidationError::Radius(request.radius_miles));
    }

    let matches = find_in_radius(
        &request.pins,
        &SpatialQuery {
            center: request.center,
            radius_miles: request.radius_miles,
        },
    );
    let payload = RadiusResponse {
        count: matches.len(),
        matches,
    };
    (StatusCode::OK, Json(payload)).into_response()
}

async fn spatial_summary(
    State(state): State<ApiState>,
    Json(request): Json<PinsRequest>,
) -> impl IntoResponse {
    let payload = SummaryResponse {
        count: request.pins.len(),
        center: centroid(&request.pins, &state.map_defaults),
        bounds: bounds(&request.pins, &state.map_defaults),
    };
    (StatusCode::OK, Json(payload))
}

async fn export_pins(Path(format): Path<String>, Json(request): Json<ExportRequest>) -> Response {
    let (body, content_type, extension) = match format.as_str() {
        "csv" => (to_csv(&request.pins), CSV_CONTENT_TYPE, "csv"),
        "kml" => (to_kml(&request.map_name, &request.pins), KML_CONTENT_TYPE, "kml"),
        other => {
            return error_response(
                StatusCode::NOT_FOUND,
                "unsupported_format",
                format!("no exporter for {other:?}; use csv or kml"),
            )
        }
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(&request.map_name, extension)
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

async fn map_lock_status(Json(request): Json<LockStatusRequest>) -> impl IntoResponse {
    let now = Utc::now();
    let until = request.editable_until.or_else(|| {
        request
            .lock_type
            .and_then(|kind| editable_until(kind, request.duration_hours, request.lock_date, now))
    });
    (
        StatusCode::OK,
        Json(LockStatusResponse {
            state: lock_state(request.is_locked, until, now),
            editable_until: until,
        }),
    )
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN)]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}

fn is_public_endpoint(path: &str) -> bool {
    path == "/health"
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if header_key != state.api_key {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid x-api-key",
        );
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if let Err(retry_after) = state.limiter.check(&ip) {
        let mut response = error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded for this IP",
        );
        let seconds = retry_after.as_secs().max(1);
        if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let request = Request::builder()
            .uri("/v1/geocode")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_ip(&request), "203.0.113.9");

        let bare = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(request_ip(&bare), "local");
    }

    #[test]
    fn only_health_is_public() {
        assert!(is_public_endpoint("/health"));
        assert!(!is_public_endpoint("/v1/chat"));
        assert!(!is_public_endpoint("/health/deep"));
    }

    #[test]
    fn default_options() {
        let options = ServiceOptions::default();
        assert_eq!(options.api_key, "dev-pinplace-key");
        assert_eq!(options.rate_limit_max, 60);
    }
}
