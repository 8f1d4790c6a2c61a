use async_trait::async_trait;
use pinplace_core::{GeocodeResult, GeocodeSource, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::GeocodeStrategy;

const PROVIDER: &str = "google";

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: Geometry,
    formatted_address: String,
    #[serde(default)]
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    results: Vec<GoogleResult>,
}

/// Google Maps geocoding. Paid; only part of the chain when a key is set.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl GeocodeStrategy for GoogleGeocoder {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn resolve(&self, query: &str) -> Result<Option<GeocodeResult>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured { provider: PROVIDER });
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("address", query), ("key", self.api_key.as_str())])
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

        let body: GoogleResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::malformed(PROVIDER, err))?;

        Ok(body.results.into_iter().next().map(|result| GeocodeResult {
            lat: result.geometry.location.lat,
            lng: result.geometry.location.lng,
            formatted_address: result.formatted_address,
            place_id: result.place_id,
            source: GeocodeSource::Google,
        }))
    }
}
