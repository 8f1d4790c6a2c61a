use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IntentError;
use crate::models::Point;

/// What the user asked for, with parameters already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    Geocode { location: String },
    CalculateDistance { pin1: String, pin2: String },
    FindRadius { center: Point, radius_miles: f64 },
    DrivingTime { pin1: String, pin2: String },
    DeleteAllPins,
    Chat,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Geocode { .. } => "geocode",
            Self::CalculateDistance { .. } => "calculate_distance",
            Self::FindRadius { .. } => "find_radius",
            Self::DrivingTime { .. } => "driving_time",
            Self::DeleteAllPins => "delete_all_pins",
            Self::Chat => "chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    pub intent: Intent,
    pub response_text: Option<String>,
}

impl ClassifiedIntent {
    pub fn chat(response_text: impl Into<String>) -> Self {
        Self {
            intent: Intent::Chat,
            response_text: Some(response_text.into()),
        }
    }

    /// Parses the JSON object a text-generation provider produced.
    ///
    /// Unknown actions, and known actions with missing or unusable
    /// parameters, degrade to `Chat` so the provider's text is still shown.
    /// Anything that is not a JSON object with a string `action` is a
    /// schema error.
    pub fn from_json(raw: &str) -> Result<Self, IntentError> {
        let wire: WireIntent = serde_json::from_str(raw.trim())
            .map_err(|err| IntentError::Schema(err.to_string()))?;
        Ok(wire.into_classified())
    }
}

/// Free-text parameters are taken as `Value` because models sometimes emit
/// a bare number for a ZIP code or a numbered pin.
#[derive(Debug, Default, Deserialize)]
struct WireParameters {
    location: Option<Value>,
    pin1: Option<Value>,
    pin2: Option<Value>,
    center_lat: Option<f64>,
    center_lng: Option<f64>,
    radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireIntent {
    action: String,
    #[serde(default)]
    parameters: Option<WireParameters>,
    #[serde(default)]
    response_text: Option<String>,
}

impl WireIntent {
    fn into_classified(self) -> ClassifiedIntent {
        let params = self.parameters.unwrap_or_default();
        let response_text = self.response_text.filter(|text| !text.trim().is_empty());

        let intent = match self.action.trim().to_lowercase().as_str() {
            "geocode" => non_blank(params.location)
                .map(|location| Intent::Geocode { location })
                .unwrap_or(Intent::Chat),
            "calculate_distance" => match (non_blank(params.pin1), non_blank(params.pin2)) {
                (Some(pin1), Some(pin2)) => Intent::CalculateDistance { pin1, pin2 },
                _ => Intent::Chat,
            },
            "driving_time" => match (non_blank(params.pin1), non_blank(params.pin2)) {
                (Some(pin1), Some(pin2)) => Intent::DrivingTime { pin1, pin2 },
                _ => Intent::Chat,
            },
            "find_radius" => match (params.center_lat, params.center_lng, params.radius) {
                (Some(lat), Some(lng), Some(radius)) if radius.is_finite() && radius > 0.0 => {
                    Point::try_new(lat, lng)
                        .map(|center| Intent::FindRadius {
                            center,
                            radius_miles: radius,
                        })
                        .unwrap_or(Intent::Chat)
                }
                _ => Intent::Chat,
            },
            "delete_all_pins" => Intent::DeleteAllPins,
            _ => Intent::Chat,
        };

        ClassifiedIntent {
            intent,
            response_text,
        }
    }
}

fn non_blank(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
