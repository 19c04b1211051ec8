//! Command dispatch: resolves outbound commands to the button whose topic/payload
//! gets published. Payloads are static, captured at discovery time.

use crate::error::BridgeError;
use crate::features::{FeatureCode, canonicalize, to_button_name};
use crate::registry::{Button, ButtonRegistry};
use tracing::{debug, warn};

pub struct CommandDispatcher<'a> {
    registry: &'a ButtonRegistry,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(registry: &'a ButtonRegistry) -> Self {
        Self { registry }
    }

    /// First button of the entity whose name canonicalizes to the feature's button
    /// name. `None` (logged) when the entity, the mapping or the button is missing.
    pub fn canonical(&self, entity_id: &str, code: FeatureCode) -> Option<Button> {
        let buttons = match self.registry.get_buttons(entity_id) {
            Ok(buttons) if !buttons.is_empty() => buttons,
            Ok(_) => {
                warn!(entity_id, feature = %code, "Entity has no buttons");
                return None;
            }
            Err(e) => {
                warn!(entity_id, feature = %code, error = %e, "Command for unknown entity");
                return None;
            }
        };
        let Some(button_name) = to_button_name(code) else {
            warn!(entity_id, feature = %code, "Feature has no button name");
            return None;
        };
        let found = buttons
            .iter()
            .find(|b| canonicalize(b.name()) == button_name)
            .cloned();
        if found.is_none() {
            debug!(entity_id, button_name, "No button matches feature");
        }
        found
    }

    /// Button at `index`. An index outside the list is a host integration bug and is
    /// reported, not ignored.
    pub fn custom(&self, entity_id: &str, index: usize) -> Result<Button, BridgeError> {
        let buttons = self.registry.get_buttons(entity_id)?;
        buttons
            .get(index)
            .cloned()
            .ok_or(BridgeError::OutOfRange {
                index,
                len: buttons.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ButtonRegistry {
        let mut registry = ButtonRegistry::new();
        registry.upsert_button("MQTT_DEVICE.tv", Button::new("FOO_BAR", "t/foo", "x"));
        registry.upsert_button("MQTT_DEVICE.tv", Button::new("volume up", "t/vol", "1"));
        registry.upsert_button("MQTT_DEVICE.tv", Button::new("VOLUME_UP", "t/vol2", "2"));
        registry
    }

    #[test]
    fn test_canonical_matches_first_case_insensitive() {
        let registry = registry();
        let dispatcher = CommandDispatcher::new(&registry);
        let button = dispatcher
            .canonical("MQTT_DEVICE.tv", FeatureCode::VolumeUp)
            .unwrap();
        assert_eq!(button.topic(), "t/vol");
        assert_eq!(button.payload(), "1");
    }

    #[test]
    fn test_canonical_misses_are_none() {
        let mut registry = registry();
        registry.upsert_button("MQTT_DEVICE.empty", Button::new("X", "t", "p"));
        registry.clear_buttons("MQTT_DEVICE.empty");
        let dispatcher = CommandDispatcher::new(&registry);
        assert!(dispatcher.canonical("MQTT_DEVICE.tv", FeatureCode::Play).is_none());
        assert!(dispatcher.canonical("MQTT_DEVICE.radio", FeatureCode::VolumeUp).is_none());
        assert!(dispatcher.canonical("MQTT_DEVICE.empty", FeatureCode::VolumeUp).is_none());
    }

    #[test]
    fn test_custom_bounds() {
        let registry = registry();
        let dispatcher = CommandDispatcher::new(&registry);
        assert_eq!(
            dispatcher.custom("MQTT_DEVICE.tv", 0).unwrap(),
            Button::new("FOO_BAR", "t/foo", "x")
        );
        let e = dispatcher.custom("MQTT_DEVICE.tv", 3).unwrap_err();
        assert!(matches!(e, BridgeError::OutOfRange { index: 3, len: 3 }));
        let e = dispatcher.custom("MQTT_DEVICE.radio", 0).unwrap_err();
        assert!(matches!(e, BridgeError::NotFound(_)));
    }
}
