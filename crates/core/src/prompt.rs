use chrono::{DateTime, Utc};

use crate::models::{AssistantContext, Role};

const SAMPLE_PIN_NAMES: usize = 5;

pub fn build_system_prompt(context: &AssistantContext, now: DateTime<Utc>) -> String {
    let samples = context
        .pins
        .iter()
        .take(SAMPLE_PIN_NAMES)
        .map(|pin| pin.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let ellipsis = if context.pins.len() > SAMPLE_PIN_NAMES {
        "..."
    } else {
        ""
    };
    let status = if context.map.is_locked_at(now) {
        "LOCKED"
    } else {
        "OPEN"
    };
    let role = match context.role() {
        Role::Creator => "MAP CREATOR",
        Role::Viewer => "VIEWER",
    };

    format!(
        r#"You are an intelligent map assistant for PinPlace. Analyze user requests and determine the appropriate action.

Map: "{name}"
Pins: {count} ({samples}{ellipsis})
Map Status: {status}
User Role: {role}

Actions you can take:
1. "geocode" - Add pins by geocoding locations (zip codes, addresses, cities). Set parameters: {{location: "..."}}
2. "calculate_distance" - Calculate distance between pins. Set parameters: {{pin1: "...", pin2: "..."}}
3. "find_radius" - Find pins in radius. Set parameters: {{center_lat: ..., center_lng: ..., radius: ...}}
4. "driving_time" - Calculate driving time. Set parameters: {{pin1: "...", pin2: "..."}}
5. "delete_all_pins" - Delete all pins from the map (ONLY if user is MAP CREATOR)
6. "chat" - Just chat with the user

Examples:
User: "add 92008"
Response: {{"action": "geocode", "parameters": {{"location": "92008"}}, "response_text": "Adding zip code 92008..."}}

User: "distance between Pin A and Pin B"
Response: {{"action": "calculate_distance", "parameters": {{"pin1": "Pin A", "pin2": "Pin B"}}, "response_text": "Calculating distance..."}}

User: "delete all pins"
Response: {{"action": "delete_all_pins", "response_text": "Deleting all pins from the map..."}}

User: "hello"
Response: {{"action": "chat", "response_text": "Hello! I can help you with map operations. Try asking me to add a location or calculate distances!"}}

Be intelligent and conversational. Always include response_text."#,
        name = context.map.name,
        count = context.pins.len(),
    )
}

/// Full generation prompt: system prompt, the user's message, and the
/// required JSON shape.
pub fn build_generation_prompt(system_prompt: &str, message: &str) -> String {
    format!(
        "{system_prompt}\n\nUser: {message}\n\nAnalyze this request and respond with a JSON object indicating your intent. Format:\n{{\n  \"action\": \"geocode\" | \"calculate_distance\" | \"find_radius\" | \"driving_time\" | \"delete_all_pins\" | \"chat\",\n  \"parameters\": {{...}},\n  \"response_text\": \"conversational response to user\"\n}}\n\nAssistant:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MapContext, Pin};

    fn context(pins: usize, caller: &str, locked: bool) -> AssistantContext {
        AssistantContext {
            map: MapContext {
                name: "Beach Day".to_string(),
                owner_id: "owner".to_string(),
                is_locked: locked,
                editable_until: None,
            },
            pins: (1..=pins)
                .map(|i| Pin {
                    id: i.to_string(),
                    lat: 0.0,
                    lng: 0.0,
                    name: format!("Spot {i}"),
                    description: None,
                    created_at: Utc::now(),
                })
                .collect(),
            caller_id: Some(caller.to_string()),
        }
    }

    #[test]
    fn embeds_map_state() {
        let prompt = build_system_prompt(&context(2, "owner", false), Utc::now());
        assert!(prompt.contains("Map: \"Beach Day\""));
        assert!(prompt.contains("Pins: 2 (Spot 1, Spot 2)"));
        assert!(prompt.contains("Map Status: OPEN"));
        assert!(prompt.contains("User Role: MAP CREATOR"));
    }

    #[test]
    fn samples_at_most_five_pins() {
        let prompt = build_system_prompt(&context(7, "guest", true), Utc::now());
        assert!(prompt.contains("Pins: 7 (Spot 1, Spot 2, Spot 3, Spot 4, Spot 5...)"));
        assert!(!prompt.contains("Spot 6"));
        assert!(prompt.contains("Map Status: LOCKED"));
        assert!(prompt.contains("User Role: VIEWER"));
    }

    #[test]
    fn generation_prompt_wraps_message() {
        let prompt = build_generation_prompt("SYSTEM", "add 92008");
        assert!(prompt.starts_with("SYSTEM\n\nUser: add 92008\n\n"));
        assert!(prompt.ends_with("Assistant:"));
    }
}
