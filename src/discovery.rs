//! Config ingestion: turns `{"devices": ...}` and `{"activities": ...}` discovery
//! payloads into registry entries and per-entity feature lists.
//!
//! Device buttons are `[topic, payload]`, activity buttons are
//! `[unused, topic, payload]`. Which shape applies is decided by the entity category
//! alone (see [`parse_button_definition`]), never by the list length.
//!
//! Failures are local: a malformed button is skipped, a malformed entity is skipped,
//! and neither touches the registry entries of other entities.

use crate::catalog::{EntityCatalog, NewEntity, REMOTE_KIND};
use crate::error::{BridgeError, err};
use crate::features::{FeatureCode, to_feature_code};
use crate::registry::{Button, ButtonRegistry, EntityCategory};
use crate::topics;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Name of the synthesized activation button of every activity.
pub const POWER_ON_BUTTON: &str = "POWERON";
/// Name of the synthesized deactivation button of every activity.
pub const POWER_OFF_BUTTON: &str = "POWEROFF";

/// A button payload as found in discovery messages: either used verbatim or
/// flattened to single-line JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ButtonPayload {
    Text(String),
    Object(Map<String, Value>),
}

impl ButtonPayload {
    fn from_value(value: &Value) -> Result<Self, BridgeError> {
        match value {
            Value::String(s) => Ok(ButtonPayload::Text(s.clone())),
            Value::Object(map) => Ok(ButtonPayload::Object(map.clone())),
            other => Err(err::parse(format!(
                "payload must be a string or an object, got {other}"
            ))),
        }
    }

    /// Exact bytes to publish.
    pub fn into_wire(self) -> Result<String, BridgeError> {
        match self {
            ButtonPayload::Text(s) => Ok(s),
            // Compact output escapes newlines inside strings and emits none of its own
            ButtonPayload::Object(map) => Ok(serde_json::to_string(&Value::Object(map))?),
        }
    }
}

/// Build a [`Button`] from one entry of a `Buttons`/`buttons` map.
pub fn parse_button_definition(
    category: EntityCategory,
    name: &str,
    definition: &Value,
) -> Result<Button, BridgeError> {
    let slots = definition
        .as_array()
        .ok_or_else(|| err::parse(format!("button '{name}' definition is not a list")))?;
    let (topic_slot, payload_slot) = match category {
        EntityCategory::Device => (0, 1),
        EntityCategory::Activity => (1, 2),
    };
    let topic = slots
        .get(topic_slot)
        .and_then(Value::as_str)
        .ok_or_else(|| err::parse(format!("button '{name}' has no topic at index {topic_slot}")))?;
    let payload = slots
        .get(payload_slot)
        .ok_or_else(|| err::parse(format!("button '{name}' has no payload at index {payload_slot}")))?;
    let payload = ButtonPayload::from_value(payload)?.into_wire()?;
    Ok(Button::new(name, topic, payload))
}

#[derive(Debug, Deserialize)]
struct DeviceDefinition {
    #[serde(rename = "Buttons", default)]
    buttons: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ActivityDefinition {
    activation: Vec<Value>,
    deactivation: Vec<Value>,
    #[serde(default)]
    buttons: Map<String, Value>,
}

/// Supported features (canonical codes) and custom features (every registered
/// button name, in registration order).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeatureLists {
    pub supported: Vec<String>,
    pub custom: Vec<String>,
}

impl FeatureLists {
    fn support(&mut self, code: FeatureCode) {
        if !self.supported.iter().any(|s| s == code.as_str()) {
            self.supported.push(code.as_str().to_string());
        }
    }

    fn classify(&mut self, button_name: &str) {
        if let Some(code) = to_feature_code(button_name) {
            self.support(code);
        }
        self.custom.push(button_name.to_string());
    }
}

/// Which entities a discovery message touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
}

/// Applies discovery messages to the registry and the host catalog.
pub struct ConfigIngestor<'a> {
    catalog: &'a dyn EntityCatalog,
    integration_id: &'a str,
}

impl<'a> ConfigIngestor<'a> {
    pub fn new(catalog: &'a dyn EntityCatalog, integration_id: &'a str) -> Self {
        Self {
            catalog,
            integration_id,
        }
    }

    pub fn ingest_devices(
        &self,
        registry: &mut ButtonRegistry,
        devices: &Map<String, Value>,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        for (device_name, definition) in devices {
            let entity_id = EntityCategory::Device.entity_id(device_name);
            let definition: DeviceDefinition = match serde_json::from_value(definition.clone()) {
                Ok(d) => d,
                Err(e) => {
                    warn!(entity_id = %entity_id, error = %e, "Skipping malformed device definition");
                    report.skipped.push(entity_id);
                    continue;
                }
            };

            let updating = Self::reset_entity(registry, &entity_id);
            let mut features = FeatureLists::default();
            self.register_buttons(
                registry,
                EntityCategory::Device,
                &entity_id,
                &definition.buttons,
                &mut features,
            );
            self.publish_entity(&entity_id, device_name, features);
            if updating {
                report.updated.push(entity_id);
            } else {
                report.added.push(entity_id);
            }
        }
        report
    }

    pub fn ingest_activities(
        &self,
        registry: &mut ButtonRegistry,
        known_activities: &mut BTreeSet<String>,
        activities: &Map<String, Value>,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        for (activity_name, definition) in activities {
            let entity_id = EntityCategory::Activity.entity_id(activity_name);
            let (definition, power_on, power_off) = match Self::parse_activity(definition) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(entity_id = %entity_id, error = %e, "Skipping malformed activity definition");
                    report.skipped.push(entity_id);
                    continue;
                }
            };

            let updating = Self::reset_entity(registry, &entity_id);
            known_activities.insert(entity_id.clone());

            let mut features = FeatureLists::default();
            registry.upsert_button(
                &entity_id,
                Button::new(POWER_ON_BUTTON, topics::ACTIVITY_CONTROL, power_on),
            );
            registry.upsert_button(
                &entity_id,
                Button::new(POWER_OFF_BUTTON, topics::ACTIVITY_CONTROL, power_off),
            );
            features.support(FeatureCode::PowerOn);
            features.support(FeatureCode::PowerOff);
            features.custom.push(POWER_ON_BUTTON.to_string());
            features.custom.push(POWER_OFF_BUTTON.to_string());

            self.register_buttons(
                registry,
                EntityCategory::Activity,
                &entity_id,
                &definition.buttons,
                &mut features,
            );
            self.publish_entity(&entity_id, activity_name, features);
            if updating {
                report.updated.push(entity_id);
            } else {
                report.added.push(entity_id);
            }
        }
        report
    }

    /// Validates an activity before anything is registered for it.
    fn parse_activity(
        definition: &Value,
    ) -> Result<(ActivityDefinition, String, String), BridgeError> {
        let definition: ActivityDefinition = serde_json::from_value(definition.clone())?;
        let power_on = definition
            .activation
            .first()
            .ok_or_else(|| err::parse("empty activation list"))
            .and_then(ButtonPayload::from_value)?
            .into_wire()?;
        let power_off = definition
            .deactivation
            .first()
            .ok_or_else(|| err::parse("empty deactivation list"))
            .and_then(ButtonPayload::from_value)?
            .into_wire()?;
        Ok((definition, power_on, power_off))
    }

    /// Clears a previously discovered entity. Returns true on the update path.
    fn reset_entity(registry: &mut ButtonRegistry, entity_id: &str) -> bool {
        if registry.has_entity(entity_id) {
            debug!(entity_id, "Re-discovery, clearing buttons");
            registry.clear_buttons(entity_id);
            true
        } else {
            false
        }
    }

    fn register_buttons(
        &self,
        registry: &mut ButtonRegistry,
        category: EntityCategory,
        entity_id: &str,
        buttons: &Map<String, Value>,
        features: &mut FeatureLists,
    ) {
        for (button_name, definition) in buttons {
            match parse_button_definition(category, button_name, definition) {
                Ok(button) => {
                    debug!(
                        target: crate::WIRE_TARGET,
                        entity_id,
                        button = button.name(),
                        topic = button.topic(),
                        payload = button.payload(),
                        "Discovered button"
                    );
                    registry.upsert_button(entity_id, button);
                    features.classify(button_name);
                }
                Err(e) => {
                    warn!(entity_id, button = %button_name, error = %e, "Skipping button");
                }
            }
        }
    }

    fn publish_entity(&self, entity_id: &str, friendly_name: &str, features: FeatureLists) {
        if self.catalog.get_entity(entity_id).is_some() {
            self.catalog
                .update_entity_features(entity_id, features.supported, features.custom);
        } else {
            info!(entity_id, "Discovered new entity");
            self.catalog.add_entity_with_custom_features(NewEntity {
                entity_id: entity_id.to_string(),
                kind: REMOTE_KIND.to_string(),
                integration_id: self.integration_id.to_string(),
                friendly_name: friendly_name.to_string(),
                supported_features: features.supported,
                custom_features: features.custom,
            });
        }
    }
}
