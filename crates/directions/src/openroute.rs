use pinplace_core::{DirectionsResult, Point, ProviderError, RouteSource};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

const PROVIDER: &str = "openroute";

#[derive(Debug, Deserialize)]
struct RouteSummary {
    #[serde(alias = "distance_meters")]
    distance: f64,
    #[serde(alias = "duration_seconds")]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct RouteProperties {
    summary: RouteSummary,
}

#[derive(Debug, Deserialize)]
struct RouteFeature {
    properties: RouteProperties,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    features: Vec<Value>,
}

/// OpenRouteService driving directions. Routes avoid highways and lean
/// slightly towards green and quiet roads.
#[derive(Debug, Clone)]
pub struct OpenRouteProvider {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl OpenRouteProvider {
    pub fn new(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
        }
    }

    pub fn request_body(start: Point, end: Point) -> Value {
        json!({
            "coordinates": [[start.lng, start.lat], [end.lng, end.lat]],
            "format": "json",
            "options": {
                "avoid_features": ["highways"],
                "profile_params": {
                    "weightings": { "green": 0.1, "quiet": 0.1 }
                }
            }
        })
    }

    pub async fn fetch(&self, start: Point, end: Point) -> Result<DirectionsResult, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured { provider: PROVIDER });
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, self.api_key.as_str())
            .json(&Self::request_body(start, end))
            .send()
            .await
            .map_err(|err| ProviderError::transport(PROVIDER, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let body: RouteResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::malformed(PROVIDER, err))?;

        parse_route(body)
    }
}

fn parse_route(body: RouteResponse) -> Result<DirectionsResult, ProviderError> {
    let Some(raw) = body.features.into_iter().next() else {
        return Err(ProviderError::malformed(PROVIDER, "no route features"));
    };
    let feature: RouteFeature = serde_json::from_value(raw.clone())
        .map_err(|err| ProviderError::malformed(PROVIDER, err))?;

    let summary = feature.properties.summary;
    if !summary.distance.is_finite() || !summary.duration.is_finite() {
        return Err(ProviderError::malformed(PROVIDER, "non-finite route summary"));
    }

    Ok(DirectionsResult {
        distance_km: summary.distance / 1000.0,
        duration_min: summary.duration / 60.0,
        route: Some(raw),
        source: RouteSource::Provider,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: Value) -> Result<DirectionsResult, ProviderError> {
        parse_route(serde_json::from_value(raw).unwrap())
    }

    #[test]
    fn body_uses_lng_lat_order() {
        let body = OpenRouteProvider::request_body(Point::new(33.1, -117.3), Point::new(32.7, -117.1));
        assert_eq!(body["coordinates"], json!([[-117.3, 33.1], [-117.1, 32.7]]));
        assert_eq!(body["options"]["avoid_features"], json!(["highways"]));
        assert_eq!(body["options"]["profile_params"]["weightings"]["quiet"], json!(0.1));
    }

    #[test]
    fn converts_units() {
        let result = parse(json!({
            "features": [{"properties": {"summary": {"distance": 12500.0, "duration": 900.0}}}]
        }))
        .unwrap();
        assert_eq!(result.distance_km, 12.5);
        assert_eq!(result.duration_min, 15.0);
        assert_eq!(result.source, RouteSource::Provider);
        assert!(result.route.is_some());
    }

    #[test]
    fn accepts_suffixed_summary_fields() {
        let result = parse(json!({
            "features": [{"properties": {"summary": {"distance_meters": 1000, "duration_seconds": 120}}}]
        }))
        .unwrap();
        assert_eq!((result.distance_km, result.duration_min), (1.0, 2.0));
    }

    #[test]
    fn empty_features_are_malformed() {
        assert!(matches!(
            parse(json!({"features": []})),
            Err(ProviderError::Malformed { .. })
        ));
        assert!(matches!(
            parse(json!({"features": [{"properties": {}}]})),
            Err(ProviderError::Malformed { .. })
        ));
    }
}
