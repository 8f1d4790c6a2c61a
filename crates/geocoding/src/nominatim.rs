//! OpenStreetMap Nominatim: free, keyless, but requires an identifying
//! User-Agent on every request.

use async_trait::async_trait;
use pinplace_core::{GeocodeResult, GeocodeSource, PlaceSuggestion, ProviderError};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{coordinate, GeocodeStrategy};

const PROVIDER: &str = "nominatim";
pub const DEFAULT_SEARCH_LIMIT: usize = 5;
pub const MAX_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    fn has_settlement(&self) -> bool {
        self.city.is_some() || self.town.is_some() || self.village.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: Value,
    lon: Value,
    display_name: String,
    #[serde(default)]
    place_id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    class: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

impl NominatimPlace {
    fn is_place_like(&self) -> bool {
        self.class.as_deref() == Some("place")
            || matches!(
                self.kind.as_deref(),
                Some("city" | "town" | "village" | "administrative")
            )
            || self
                .address
                .as_ref()
                .is_some_and(NominatimAddress::has_settlement)
    }

    fn coordinates(&self) -> Option<(f64, f64)> {
        Some((coordinate(&self.lat)?, coordinate(&self.lon)?))
    }
}

#[derive(Debug, Clone)]
pub struct NominatimProvider {
    client: Client,
    endpoint: Url,
    user_agent: String,
}

impl NominatimProvider {
    pub fn new(client: Client, endpoint: Url, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            user_agent: user_agent.into(),
        }
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        extra_tags: bool,
    ) -> Result<Vec<NominatimPlace>, ProviderError> {
        let limit = limit.to_string();
        let mut params = vec![
            ("q", query),
            ("format", "json"),
            ("limit", limit.as_str()),
            ("addressdetails", "1"),
        ];
        if extra_tags {
            params.push(("extratags", "1"));
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&params)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, "application/json")
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

        response
            .json::<Vec<NominatimPlace>>()
            .await
            .map_err(|err| ProviderError::malformed(PROVIDER, err))
    }

    /// Place-like matches for an autocomplete box.
    pub async fn search_places(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<PlaceSuggestion>, ProviderError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);

        let places = self.search(query, limit, true).await?;
        Ok(places
            .into_iter()
            .filter(NominatimPlace::is_place_like)
            .filter_map(|place| {
                let (lat, lng) = place.coordinates()?;
                let name = place
                    .name
                    .clone()
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| {
                        place
                            .display_name
                            .split(',')
                            .next()
                            .unwrap_or_default()
                            .trim()
                            .to_string()
                    });
                let country = place
                    .address
                    .as_ref()
                    .and_then(|address| address.country.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                Some(PlaceSuggestion {
                    name,
                    country,
                    lat,
                    lng,
                    display_name: place.display_name,
                })
            })
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl GeocodeStrategy for NominatimProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn resolve(&self, query: &str) -> Result<Option<GeocodeResult>, ProviderError> {
        let places = self.search(query, 1, false).await?;
        let Some(first) = places.into_iter().next() else {
            return Ok(None);
        };

        let (lat, lng) = first
            .coordinates()
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "non-numeric lat/lon"))?;

        Ok(Some(GeocodeResult {
            lat,
            lng,
            formatted_address: first.display_name,
            place_id: first.place_id.as_ref().and_then(place_id_string),
            source: GeocodeSource::Nominatim,
        }))
    }
}

fn place_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(raw: &str) -> NominatimPlace {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn parses_string_coordinates() {
        let p = place(r#"{"lat":"33.158","lon":"-117.35","display_name":"Carlsbad","place_id":123}"#);
        assert_eq!(p.coordinates(), Some((33.158, -117.35)));
        assert_eq!(p.place_id.as_ref().and_then(place_id_string).as_deref(), Some("123"));
    }

    #[test]
    fn place_like_filter() {
        assert!(place(r#"{"lat":"0","lon":"0","display_name":"x","class":"place"}"#).is_place_like());
        assert!(place(r#"{"lat":"0","lon":"0","display_name":"x","type":"town"}"#).is_place_like());
        assert!(place(
            r#"{"lat":"0","lon":"0","display_name":"x","class":"amenity","address":{"village":"Y"}}"#
        )
        .is_place_like());
        assert!(!place(
            r#"{"lat":"0","lon":"0","display_name":"x","class":"amenity","type":"cafe","address":{"country":"US"}}"#
        )
        .is_place_like());
    }
}
