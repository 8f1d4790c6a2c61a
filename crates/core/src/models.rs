use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn try_new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        let point = Self { lat, lng };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::Latitude(self.lat));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ValidationError::Longitude(self.lng));
        }
        Ok(())
    }
}

/// Anything that sits at a coordinate.
pub trait Located {
    fn point(&self) -> Point;
}

impl Located for Point {
    fn point(&self) -> Point {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialQuery {
    pub center: Point,
    pub radius_miles: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Located for Pin {
    fn point(&self) -> Point {
        Point::new(self.lat, self.lng)
    }
}

/// Pin payload handed to the caller's store when the assistant asks for
/// a new pin. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPin {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A located item annotated with its distance (miles) from a query center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithDistance<T> {
    #[serde(flatten)]
    pub item: T,
    pub distance: f64,
}

pub type PinWithDistance = WithDistance<Pin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeSource {
    Nominatim,
    Zippopotam,
    ZipTable,
    Google,
    PlaceTable,
}

impl GeocodeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nominatim => "nominatim",
            Self::Zippopotam => "zippopotam",
            Self::ZipTable => "zip_table",
            Self::Google => "google",
            Self::PlaceTable => "place_table",
        }
    }

    pub fn is_static(self) -> bool {
        matches!(self, Self::ZipTable | Self::PlaceTable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub source: GeocodeSource,
}

impl GeocodeResult {
    pub fn point(&self) -> Point {
        Point::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSuggestion {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Provider,
    Estimate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsResult {
    pub distance_km: f64,
    pub duration_min: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Value>,
    pub source: RouteSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapContext {
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub editable_until: Option<DateTime<Utc>>,
}

impl MapContext {
    /// Locked manually, or past its editable-until time.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.is_locked || self.editable_until.is_some_and(|until| until <= now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Creator,
    Viewer,
}

/// Everything the assistant may look at for one message. Pins are an
/// immutable snapshot owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantContext {
    pub map: MapContext,
    #[serde(default)]
    pub pins: Vec<Pin>,
    #[serde(default)]
    pub caller_id: Option<String>,
}

impl AssistantContext {
    pub fn role(&self) -> Role {
        match &self.caller_id {
            Some(caller) if *caller == self.map.owner_id => Role::Creator,
            _ => Role::Viewer,
        }
    }

    /// First pin whose name contains `fragment`, case-insensitively, in
    /// storage order.
    pub fn find_pin(&self, fragment: &str) -> Option<&Pin> {
        let needle = fragment.to_lowercase();
        self.pins
            .iter()
            .find(|pin| pin.name.to_lowercase().contains(&needle))
    }

    pub fn pin_names(&self) -> Vec<&str> {
        self.pins.iter().map(|pin| pin.name.as_str()).collect()
    }
}

/// Side effect the caller should perform after showing the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotAction {
    AddPin { pin: NewPin },
    HighlightPins { pin_ids: Vec<String> },
    DeleteAllPins { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<BotAction>,
}

impl ChatbotResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: Value::Null,
            action: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_action(mut self, action: BotAction) -> Self {
        self.action = Some(action);
        self
    }
}
