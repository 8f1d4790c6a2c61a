use chrono::{DateTime, Utc};

use crate::error::PolicyViolation;
use crate::models::{AssistantContext, Role};

pub const LOCKED_MAP_MESSAGE: &str =
    "Sorry, this map is locked and no new pins can be added. You can only view and analyze existing pins.";
pub const NOT_CREATOR_MESSAGE: &str = "Sorry, only the map creator can delete all pins.";
pub const NO_PINS_MESSAGE: &str = "There are no pins to delete on this map.";

/// Gates the two intents that would change a map.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapPolicy;

impl MapPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn check_add_pin(
        &self,
        context: &AssistantContext,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyViolation> {
        if context.map.is_locked_at(now) {
            return Err(PolicyViolation::MapLocked);
        }
        Ok(())
    }

    /// Role is checked before pin count, so viewers get the same refusal
    /// on an empty map.
    pub fn check_delete_all(&self, context: &AssistantContext) -> Result<(), PolicyViolation> {
        if context.role() != Role::Creator {
            return Err(PolicyViolation::NotCreator);
        }
        if context.pins.is_empty() {
            return Err(PolicyViolation::NoPins);
        }
        Ok(())
    }

    pub fn refusal_message(&self, violation: PolicyViolation) -> &'static str {
        match violation {
            PolicyViolation::MapLocked => LOCKED_MAP_MESSAGE,
            PolicyViolation::NotCreator => NOT_CREATOR_MESSAGE,
            PolicyViolation::NoPins => NO_PINS_MESSAGE,
        }
    }
}
