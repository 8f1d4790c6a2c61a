//! Runtime settings, read from `PINPLACE_*` environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::models::Point;
use crate::spatial::MapDefaults;

pub const DEFAULT_USER_AGENT: &str = "pinplace-app/1.0 (https://pinplace.vercel.app)";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_ZIPPOPOTAM_URL: &str = "https://api.zippopotam.us/us/";
pub const DEFAULT_GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_OPENROUTE_URL: &str =
    "https://api.openrouteservice.org/v2/directions/driving-car/json";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Ollama,
    Rules,
}

#[derive(Debug, Clone)]
pub struct GeocodingSettings {
    pub user_agent: String,
    pub nominatim_url: Url,
    pub zippopotam_url: Url,
    pub google_geocode_url: Url,
    pub google_maps_key: Option<String>,
    pub places_file: Option<PathBuf>,
    pub zip_codes_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DirectionsSettings {
    pub openroute_url: Url,
    pub openroute_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub classifier: ClassifierKind,
    pub ollama_url: Url,
    pub ollama_model: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub geocoding: GeocodingSettings,
    pub directions: DirectionsSettings,
    pub inference: InferenceSettings,
    pub http_timeout: Duration,
    pub map_defaults: MapDefaults,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let geocoding = GeocodingSettings {
            user_agent: get("PINPLACE_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            nominatim_url: url_var(&get, "PINPLACE_NOMINATIM_URL", DEFAULT_NOMINATIM_URL)?,
            zippopotam_url: base_url_var(&get, "PINPLACE_ZIPPOPOTAM_URL", DEFAULT_ZIPPOPOTAM_URL)?,
            google_geocode_url: url_var(
                &get,
                "PINPLACE_GOOGLE_GEOCODE_URL",
                DEFAULT_GOOGLE_GEOCODE_URL,
            )?,
            google_maps_key: get("PINPLACE_GOOGLE_MAPS_KEY"),
            places_file: get("PINPLACE_PLACES_FILE").map(PathBuf::from),
            zip_codes_file: get("PINPLACE_ZIP_CODES_FILE").map(PathBuf::from),
        };

        let directions = DirectionsSettings {
            openroute_url: url_var(&get, "PINPLACE_OPENROUTE_URL", DEFAULT_OPENROUTE_URL)?,
            openroute_key: get("PINPLACE_OPENROUTE_KEY"),
        };

        let classifier = match get("PINPLACE_CLASSIFIER").map(|v| v.to_lowercase()) {
            None => ClassifierKind::Ollama,
            Some(v) if v == "ollama" => ClassifierKind::Ollama,
            Some(v) if v == "rules" => ClassifierKind::Rules,
            Some(value) => {
                return Err(ConfigError::Choice {
                    key: "PINPLACE_CLASSIFIER",
                    value,
                })
            }
        };
        let inference = InferenceSettings {
            classifier,
            ollama_url: base_url_var(&get, "PINPLACE_OLLAMA_URL", DEFAULT_OLLAMA_URL)?,
            ollama_model: get("PINPLACE_OLLAMA_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
        };

        let timeout_secs = match get("PINPLACE_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Number {
                key: "PINPLACE_HTTP_TIMEOUT_SECS",
                value: raw,
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let map_defaults = match (
            number_var(&get, "PINPLACE_HOME_LAT")?,
            number_var(&get, "PINPLACE_HOME_LNG")?,
        ) {
            (Some(lat), Some(lng)) => MapDefaults::around(Point::try_new(lat, lng)?),
            _ => MapDefaults::default(),
        };

        Ok(Self {
            geocoding,
            directions,
            inference,
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
            map_defaults,
        })
    }
}

fn url_var<G>(get: &G, key: &'static str, default: &str) -> Result<Url, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|_| ConfigError::Url { key, value: raw })
}

/// Bases are later extended with `Url::join`, which replaces the last path
/// segment unless the path ends in `/`.
fn base_url_var<G>(get: &G, key: &'static str, default: &str) -> Result<Url, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let mut url = url_var(get, key, default)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn number_var<G>(get: &G, key: &'static str) -> Result<Option<f64>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| ConfigError::Number { key, value: raw })
        })
        .transpose()
}
