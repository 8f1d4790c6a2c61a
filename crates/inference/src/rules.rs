//! Keyword classifier for running without a language model.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use pinplace_core::{ClassifiedIntent, Intent, IntentError, Point};
use regex::Regex;

use crate::IntentClassifier;

const HELP_TEXT: &str = "I can add places to the map, measure distances between pins, find pins near a point and estimate driving times. Try \"add 92008\" or \"distance between Pin A and Pin B\".";

static DELETE_ALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:delete|remove|clear)\s+(?:all|every)\b.*\bpins?\b")
        .expect("delete pattern compiles")
});
static DRIVING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:driving\s+time|drive|driving)\b.*?\bfrom\s+(.+?)\s+to\s+(.+?)[\s?.!]*$")
        .expect("driving pattern compiles")
});
static DISTANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdistance\s+(?:between|from)\s+(.+?)\s+(?:and|to)\s+(.+?)[\s?.!]*$")
        .expect("distance pattern compiles")
});
static RADIUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bwithin\s+([0-9]+(?:\.[0-9]+)?)\s*(?:mi|miles?)\s+of\s+(-?[0-9]+(?:\.[0-9]+)?)\s*,\s*(-?[0-9]+(?:\.[0-9]+)?)",
    )
    .expect("radius pattern compiles")
});
static ADD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:please\s+)?(?:add|pin|drop)\s+(?:a\s+pin\s+(?:for|at)\s+)?(.+?)[\s.!]*$")
        .expect("add pattern compiles")
});

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleIntentClassifier;

impl RuleIntentClassifier {
    pub fn classify_text(&self, message: &str) -> ClassifiedIntent {
        let message = message.trim();

        if DELETE_ALL.is_match(message) {
            return ClassifiedIntent {
                intent: Intent::DeleteAllPins,
                response_text: None,
            };
        }

        if let Some(caps) = DRIVING.captures(message) {
            return ClassifiedIntent {
                intent: Intent::DrivingTime {
                    pin1: caps[1].trim().to_string(),
                    pin2: caps[2].trim().to_string(),
                },
                response_text: Some("Calculating driving time...".to_string()),
            };
        }

        if let Some(caps) = DISTANCE.captures(message) {
            return ClassifiedIntent {
                intent: Intent::CalculateDistance {
                    pin1: caps[1].trim().to_string(),
                    pin2: caps[2].trim().to_string(),
                },
                response_text: Some("Calculating distance...".to_string()),
            };
        }

        if let Some(caps) = RADIUS.captures(message) {
            let radius = caps[1].parse::<f64>().ok();
            let center = caps[2]
                .parse::<f64>()
                .ok()
                .zip(caps[3].parse::<f64>().ok())
                .and_then(|(lat, lng)| Point::try_new(lat, lng).ok());
            if let (Some(radius_miles), Some(center)) = (radius, center) {
                if radius_miles > 0.0 {
                    return ClassifiedIntent {
                        intent: Intent::FindRadius {
                            center,
                            radius_miles,
                        },
                        response_text: None,
                    };
                }
            }
        }

        if let Some(caps) = ADD.captures(message) {
            let location = caps[1].trim().to_string();
            return ClassifiedIntent {
                response_text: None,
                intent: Intent::Geocode { location },
            };
        }

        ClassifiedIntent::chat(HELP_TEXT)
    }
}

#[async_trait]
impl IntentClassifier for RuleIntentClassifier {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn classify(
        &self,
        _system_prompt: &str,
        message: &str,
    ) -> Result<ClassifiedIntent, IntentError> {
        Ok(self.classify_text(message))
    }
}
