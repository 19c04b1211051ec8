//! Per-entity ordered button store.
//!
//! The position of a button in its entity's list is the address used by custom
//! dispatch, so insertion order is preserved and re-discovery clears the list
//! rather than diffing it.

use crate::error::{BridgeError, err};
use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

/// Prefix for entities discovered from `{"devices": ...}` payloads.
pub const DEVICE_PREFIX: &str = "MQTT_DEVICE.";
/// Prefix for entities discovered from `{"activities": ...}` payloads.
pub const ACTIVITY_PREFIX: &str = "MQTT_ACTIVITY.";

/// Entity category, derived solely from the identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCategory {
    Device,
    Activity,
}

impl EntityCategory {
    pub fn prefix(self) -> &'static str {
        match self {
            EntityCategory::Device => DEVICE_PREFIX,
            EntityCategory::Activity => ACTIVITY_PREFIX,
        }
    }

    pub fn entity_id(self, name: &str) -> String {
        format!("{}{name}", self.prefix())
    }

    pub fn of(entity_id: &str) -> Option<Self> {
        if entity_id.starts_with(DEVICE_PREFIX) {
            Some(EntityCategory::Device)
        } else if entity_id.starts_with(ACTIVITY_PREFIX) {
            Some(EntityCategory::Activity)
        } else {
            None
        }
    }
}

/// One controllable action: publish `payload` to `topic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    name: String,
    topic: String,
    payload: String,
}

impl Button {
    pub fn new(name: impl Into<String>, topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[derive(Debug, Default)]
pub struct ButtonRegistry {
    entities: HashMap<String, Vec<Button>>,
}

impl ButtonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `button` to the entity's list, creating the list on first use.
    pub fn upsert_button(&mut self, entity_id: &str, button: Button) {
        let buttons = self.entities.entry(entity_id.to_string()).or_default();
        trace!(
            entity_id,
            index = buttons.len(),
            name = button.name(),
            "Registering button"
        );
        buttons.push(button);
    }

    /// Empty the list for re-discovery. The entity stays known.
    pub fn clear_buttons(&mut self, entity_id: &str) {
        if let Some(buttons) = self.entities.get_mut(entity_id) {
            buttons.clear();
        }
    }

    pub fn get_buttons(&self, entity_id: &str) -> Result<&[Button], BridgeError> {
        self.entities
            .get(entity_id)
            .map(Vec::as_slice)
            .ok_or_else(|| err::not_found(entity_id))
    }

    pub fn has_entity(&self, entity_id: &str) -> bool {
        self.entities.contains_key(entity_id)
    }
}
