use async_trait::async_trait;
use pinplace_core::{GeocodeResult, GeocodeSource, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{coordinate, ZipSource};

const PROVIDER: &str = "zippopotam";

#[derive(Debug, Deserialize)]
struct ZipPlace {
    #[serde(rename = "place name")]
    place_name: String,
    #[serde(rename = "state abbreviation")]
    state_abbreviation: String,
    latitude: Value,
    longitude: Value,
}

#[derive(Debug, Deserialize)]
struct ZipResponse {
    #[serde(default)]
    places: Vec<ZipPlace>,
}

/// US ZIP lookups against zippopotam.us. Free and keyless.
#[derive(Debug, Clone)]
pub struct ZippopotamProvider {
    client: Client,
    base: Url,
}

impl ZippopotamProvider {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }
}

#[async_trait]
impl ZipSource for ZippopotamProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn lookup_zip(&self, zip5: &str) -> Result<Option<GeocodeResult>, ProviderError> {
        let url = self
            .base
            .join(zip5)
            .map_err(|err| ProviderError::malformed(PROVIDER, err))?;

        let response = self
            .client
            .get(url)
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

        let body: ZipResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::malformed(PROVIDER, err))?;

        let Some(place) = body.places.first() else {
            return Ok(None);
        };
        let (Some(lat), Some(lng)) = (coordinate(&place.latitude), coordinate(&place.longitude))
        else {
            return Err(ProviderError::malformed(PROVIDER, "non-numeric coordinates"));
        };

        Ok(Some(GeocodeResult {
            lat,
            lng,
            formatted_address: format!(
                "{}, {} {}, USA",
                place.place_name, place.state_abbreviation, zip5
            ),
            place_id: None,
            source: GeocodeSource::Zippopotam,
        }))
    }
}
