use chrono::{DateTime, Utc};
use serde_json::json;

use crate::models::{
    AssistantContext, BotAction, ChatbotResponse, DirectionsResult, GeocodeResult, NewPin, Pin,
    PinWithDistance,
};

pub const APOLOGY_MESSAGE: &str =
    "I'm having trouble connecting to the AI service. Please try again later.";
pub const FALLBACK_CHAT_MESSAGE: &str = "I'm not sure how to help with that.";

pub fn apology() -> ChatbotResponse {
    ChatbotResponse::message(APOLOGY_MESSAGE)
}

pub fn chat(response_text: Option<&str>) -> ChatbotResponse {
    ChatbotResponse::message(response_text.unwrap_or(FALLBACK_CHAT_MESSAGE))
}

pub fn bot_pin_description(address: &str, now: DateTime<Utc>) -> String {
    format!(
        "Added by chatbot at {} - {}",
        now.format("%Y-%m-%d %H:%M:%S UTC"),
        address
    )
}

pub fn pin_added(
    location: &str,
    result: &GeocodeResult,
    response_text: Option<&str>,
    now: DateTime<Utc>,
) -> ChatbotResponse {
    let message = response_text.map(str::to_string).unwrap_or_else(|| {
        format!(
            "Adding pin for {} at {} ({:.4}, {:.4}).",
            location, result.formatted_address, result.lat, result.lng
        )
    });

    let pin = NewPin {
        lat: result.lat,
        lng: result.lng,
        name: location.to_string(),
        description: Some(bot_pin_description(&result.formatted_address, now)),
    };

    ChatbotResponse::message(message)
        .with_data(json!({
            "formatted_address": result.formatted_address,
            "source": result.source,
        }))
        .with_action(BotAction::AddPin { pin })
}

pub fn location_not_found(location: &str) -> ChatbotResponse {
    ChatbotResponse::message(format!(
        "I couldn't find the location \"{}\". Please try a different location or provide coordinates directly.",
        location
    ))
}

pub fn pins_not_found(context: &AssistantContext) -> ChatbotResponse {
    ChatbotResponse::message(format!(
        "I couldn't find one or both of the pins. Available pins: {}",
        context.pin_names().join(", ")
    ))
}

pub fn distance_between(from: &Pin, to: &Pin, miles: f64) -> ChatbotResponse {
    ChatbotResponse::message(format!(
        "The distance between {} and {} is {:.2} miles.",
        from.name, to.name, miles
    ))
    .with_data(json!({
        "pin1": from,
        "pin2": to,
        "distance": miles,
    }))
}

pub fn radius_matches(radius_miles: f64, hits: &[PinWithDistance]) -> ChatbotResponse {
    if hits.is_empty() {
        return ChatbotResponse::message(format!(
            "No pins found within {} miles of the specified location.",
            radius_miles
        ));
    }

    let listing = hits
        .iter()
        .map(|hit| format!("{} ({:.2} miles away)", hit.item.name, hit.distance))
        .collect::<Vec<_>>()
        .join("\n- ");

    ChatbotResponse::message(format!(
        "Found {} pin(s) within {} miles:\n- {}",
        hits.len(),
        radius_miles,
        listing
    ))
    .with_data(json!(hits))
    .with_action(BotAction::HighlightPins {
        pin_ids: hits.iter().map(|hit| hit.item.id.clone()).collect(),
    })
}

pub fn driving_time(
    from: &Pin,
    to: &Pin,
    directions: &DirectionsResult,
    duration_text: &str,
    distance_text: &str,
) -> ChatbotResponse {
    ChatbotResponse::message(format!(
        "Driving from {} to {} would take approximately {} and cover {}.",
        from.name, to.name, duration_text, distance_text
    ))
    .with_data(json!({
        "start_pin": from,
        "end_pin": to,
        "distance": directions.distance_km,
        "duration": directions.duration_min,
        "directions": directions,
    }))
}

pub fn delete_all(count: usize, response_text: Option<&str>) -> ChatbotResponse {
    let message = response_text
        .map(str::to_string)
        .unwrap_or_else(|| format!("Deleting all {} pins from the map...", count));
    ChatbotResponse::message(message).with_action(BotAction::DeleteAllPins { count })
}
