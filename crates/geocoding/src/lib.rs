mod gazetteer;
mod google;
mod nominatim;
mod patterns;
mod zippopotam;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use pinplace_core::config::GeocodingSettings;
use pinplace_core::{GeocodeResult, LookupError, PlaceSuggestion, ProviderError};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

pub use gazetteer::{PlaceTable, ZipTable};
pub use google::GoogleGeocoder;
pub use nominatim::{NominatimProvider, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
pub use patterns::{extract_zip, is_street_address, is_zip, zip5};
pub use zippopotam::ZippopotamProvider;

/// One link of the address chain. `Ok(None)` is a clean miss; `Err` means
/// the source itself failed. Both move on to the next link.
#[async_trait]
pub trait GeocodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn resolve(&self, query: &str) -> Result<Option<GeocodeResult>, ProviderError>;
}

#[async_trait]
pub trait ZipSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn lookup_zip(&self, zip5: &str) -> Result<Option<GeocodeResult>, ProviderError>;
}

/// Free text or ZIP to coordinates. Never fails for provider reasons;
/// the only error is exhausting every source.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve_address(&self, text: &str) -> Result<GeocodeResult, LookupError>;
    async fn resolve_zip(&self, zip: &str) -> Result<GeocodeResult, LookupError>;
}

pub(crate) fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Live ZIP provider with a static table behind it.
#[derive(Clone)]
pub struct ZipResolver {
    source: Arc<dyn ZipSource>,
    table: Arc<ZipTable>,
}

impl ZipResolver {
    pub fn new(source: Arc<dyn ZipSource>, table: Arc<ZipTable>) -> Self {
        Self { source, table }
    }

    pub async fn resolve(&self, zip: &str) -> Result<GeocodeResult, LookupError> {
        let zip = zip.trim();
        let Some(zip5) = zip5(zip) else {
            return Err(LookupError::not_found(zip));
        };

        match self.source.lookup_zip(zip5).await {
            Ok(Some(result)) => return Ok(result),
            Ok(None) => debug!(zip = zip5, provider = self.source.name(), "zip provider had no places"),
            Err(err) => warn!(zip = zip5, error = %err, "zip provider failed, using static table"),
        }

        self.table
            .lookup(zip5)
            .ok_or_else(|| LookupError::not_found(zip))
    }
}

/// Pulls a ZIP out of free text and resolves that instead. Street-style
/// input keeps its original wording as the address.
pub struct EmbeddedZip {
    zips: Arc<ZipResolver>,
}

impl EmbeddedZip {
    pub fn new(zips: Arc<ZipResolver>) -> Self {
        Self { zips }
    }
}

#[async_trait]
impl GeocodeStrategy for EmbeddedZip {
    fn name(&self) -> &'static str {
        "embedded_zip"
    }

    async fn resolve(&self, query: &str) -> Result<Option<GeocodeResult>, ProviderError> {
        let Some(zip) = extract_zip(query) else {
            return Ok(None);
        };

        match self.zips.resolve(zip).await {
            Ok(mut result) => {
                if is_street_address(query) {
                    result.formatted_address = query.to_string();
                }
                Ok(Some(result))
            }
            Err(LookupError::NotFound { .. }) => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct GeocodingResolver {
    strategies: Vec<Arc<dyn GeocodeStrategy>>,
    zips: Arc<ZipResolver>,
    places: Option<Arc<NominatimProvider>>,
}

impl GeocodingResolver {
    /// Tries `strategies` in order and returns the first hit.
    pub fn new(strategies: Vec<Arc<dyn GeocodeStrategy>>, zips: Arc<ZipResolver>) -> Self {
        Self {
            strategies,
            zips,
            places: None,
        }
    }

    /// The production order: free geocoder, embedded ZIP, paid geocoder
    /// (when present), static place table.
    pub fn standard(
        free: Arc<dyn GeocodeStrategy>,
        zips: Arc<ZipResolver>,
        paid: Option<Arc<dyn GeocodeStrategy>>,
        places: Arc<PlaceTable>,
    ) -> Self {
        let mut strategies: Vec<Arc<dyn GeocodeStrategy>> =
            vec![free, Arc::new(EmbeddedZip::new(zips.clone()))];
        strategies.extend(paid);
        strategies.push(places);
        Self::new(strategies, zips)
    }

    pub fn from_settings(settings: &GeocodingSettings, client: Client) -> Result<Self> {
        let place_table = match &settings.places_file {
            Some(path) => PlaceTable::from_path(path)?,
            None => PlaceTable::embedded()?,
        };
        let zip_table = match &settings.zip_codes_file {
            Some(path) => ZipTable::from_path(path)?,
            None => ZipTable::embedded()?,
        };

        let nominatim = Arc::new(NominatimProvider::new(
            client.clone(),
            settings.nominatim_url.clone(),
            settings.user_agent.clone(),
        ));
        let zips = Arc::new(ZipResolver::new(
            Arc::new(ZippopotamProvider::new(
                client.clone(),
                settings.zippopotam_url.clone(),
            )),
            Arc::new(zip_table),
        ));
        let paid = settings.google_maps_key.as_ref().map(|key| {
            Arc::new(GoogleGeocoder::new(
                client.clone(),
                settings.google_geocode_url.clone(),
                key.clone(),
            )) as Arc<dyn GeocodeStrategy>
        });

        let mut resolver = Self::standard(nominatim.clone(), zips, paid, Arc::new(place_table));
        resolver.places = Some(nominatim);
        Ok(resolver)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn search_places(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<PlaceSuggestion>, ProviderError> {
        match &self.places {
            Some(provider) => provider.search_places(query, limit).await,
            None => Err(ProviderError::NotConfigured {
                provider: "place_search",
            }),
        }
    }
}

#[async_trait]
impl Geocoder for GeocodingResolver {
    async fn resolve_address(&self, text: &str) -> Result<GeocodeResult, LookupError> {
        let query = text.trim();
        if query.is_empty() {
            return Err(LookupError::not_found(text));
        }

        for strategy in &self.strategies {
            match strategy.resolve(query).await {
                Ok(Some(result)) => {
                    debug!(
                        query,
                        strategy = strategy.name(),
                        source = result.source.as_str(),
                        "address resolved"
                    );
                    return Ok(result);
                }
                Ok(None) => {}
                Err(err) => warn!(query, strategy = strategy.name(), error = %err, "geocoding source failed"),
            }
        }

        Err(LookupError::not_found(query))
    }

    async fn resolve_zip(&self, zip: &str) -> Result<GeocodeResult, LookupError> {
        self.zips.resolve(zip).await
    }
}
