mod format;
mod openroute;

use async_trait::async_trait;
use pinplace_core::config::DirectionsSettings;
use pinplace_core::spatial::haversine_km;
use pinplace_core::{DirectionsResult, Point, RouteSource};
use reqwest::Client;
use tracing::{debug, warn};

pub use format::{format_distance, format_duration};
pub use openroute::OpenRouteProvider;

/// Assumed average speed for estimates, blending urban and highway driving.
pub const ESTIMATE_SPEED_KMH: f64 = 50.0;

/// Point-to-point routing. Always answers; a provider failure degrades to
/// a straight-line estimate.
#[async_trait]
pub trait RoutePlanner: Send + Sync {
    async fn route(&self, start: Point, end: Point) -> DirectionsResult;
}

pub fn estimate(start: Point, end: Point) -> DirectionsResult {
    let distance_km = haversine_km(start, end);
    DirectionsResult {
        distance_km,
        duration_min: distance_km / ESTIMATE_SPEED_KMH * 60.0,
        route: None,
        source: RouteSource::Estimate,
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectionsResolver {
    provider: Option<OpenRouteProvider>,
}

impl DirectionsResolver {
    pub fn new(provider: Option<OpenRouteProvider>) -> Self {
        Self { provider }
    }

    pub fn estimate_only() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &DirectionsSettings, client: Client) -> Self {
        let provider = settings.openroute_key.as_ref().map(|key| {
            OpenRouteProvider::new(client, settings.openroute_url.clone(), key.clone())
        });
        Self::new(provider)
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }
}

#[async_trait]
impl RoutePlanner for DirectionsResolver {
    async fn route(&self, start: Point, end: Point) -> DirectionsResult {
        let Some(provider) = &self.provider else {
            debug!("no routing key configured, estimating");
            return estimate(start, end);
        };

        match provider.fetch(start, end).await {
            Ok(result) => result,
            Err(err) => {
                warn!(provider = err.provider(), error = %err, "routing failed, estimating");
                estimate(start, end)
            }
        }
    }
}
