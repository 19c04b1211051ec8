//! Host entity catalog.
//!
//! The bridge only calls into the catalog (add/refresh entities, read and set state);
//! it never owns entity lifecycles. `InMemoryCatalog` is the host the standalone
//! binary and the tests run against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Entity kind reported for every discovered device and activity.
pub const REMOTE_KIND: &str = "remote";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityState {
    #[default]
    Offline,
    Online,
}

impl EntityState {
    pub fn is_on(self) -> bool {
        self == EntityState::Online
    }
}

/// Arguments of `add_entity_with_custom_features`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntity {
    pub entity_id: String,
    pub kind: String,
    pub integration_id: String,
    pub friendly_name: String,
    pub supported_features: Vec<String>,
    pub custom_features: Vec<String>,
}

/// Snapshot of an entity as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: String,
    pub kind: String,
    pub integration_id: String,
    pub friendly_name: String,
    pub supported_features: Vec<String>,
    pub custom_features: Vec<String>,
    pub state: EntityState,
}

impl EntityRecord {
    pub fn is_on(&self) -> bool {
        self.state.is_on()
    }

    /// Custom feature name at a host command index.
    pub fn command_name(&self, index: usize) -> Option<&str> {
        self.custom_features.get(index).map(String::as_str)
    }
}

pub trait EntityCatalog: Send + Sync {
    fn add_entity_with_custom_features(&self, entity: NewEntity);

    /// Replace the declared feature lists of an already known entity.
    fn update_entity_features(
        &self,
        entity_id: &str,
        supported_features: Vec<String>,
        custom_features: Vec<String>,
    );

    fn get_entity(&self, entity_id: &str) -> Option<EntityRecord>;

    /// Returns false when the entity is unknown.
    fn set_state(&self, entity_id: &str, state: EntityState) -> bool;

    fn entities(&self) -> Vec<EntityRecord>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entities: RwLock<BTreeMap<String, EntityRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityCatalog for InMemoryCatalog {
    fn add_entity_with_custom_features(&self, entity: NewEntity) {
        info!(
            entity_id = %entity.entity_id,
            supported = entity.supported_features.len(),
            custom = entity.custom_features.len(),
            "Adding entity"
        );
        let record = EntityRecord {
            entity_id: entity.entity_id.clone(),
            kind: entity.kind,
            integration_id: entity.integration_id,
            friendly_name: entity.friendly_name,
            supported_features: entity.supported_features,
            custom_features: entity.custom_features,
            state: EntityState::default(),
        };
        let mut guard = self.entities.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(entity.entity_id, record);
    }

    fn update_entity_features(
        &self,
        entity_id: &str,
        supported_features: Vec<String>,
        custom_features: Vec<String>,
    ) {
        let mut guard = self.entities.write().unwrap_or_else(|e| e.into_inner());
        match guard.get_mut(entity_id) {
            Some(record) => {
                debug!(entity_id, "Refreshing entity features");
                record.supported_features = supported_features;
                record.custom_features = custom_features;
            }
            None => warn!(entity_id, "Feature refresh for unknown entity ignored"),
        }
    }

    fn get_entity(&self, entity_id: &str) -> Option<EntityRecord> {
        let guard = self.entities.read().unwrap_or_else(|e| e.into_inner());
        guard.get(entity_id).cloned()
    }

    fn set_state(&self, entity_id: &str, state: EntityState) -> bool {
        let mut guard = self.entities.write().unwrap_or_else(|e| e.into_inner());
        match guard.get_mut(entity_id) {
            Some(record) => {
                record.state = state;
                true
            }
            None => false,
        }
    }

    fn entities(&self) -> Vec<EntityRecord> {
        let guard = self.entities.read().unwrap_or_else(|e| e.into_inner());
        guard.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_entity(id: &str) -> NewEntity {
        NewEntity {
            entity_id: id.into(),
            kind: REMOTE_KIND.into(),
            integration_id: "mqtt".into(),
            friendly_name: "tv".into(),
            supported_features: vec!["VOLUME_UP".into()],
            custom_features: vec!["VOLUME_UP".into(), "FOO_BAR".into()],
        }
    }

    #[test]
    fn test_add_and_get() {
        let catalog = InMemoryCatalog::new();
        catalog.add_entity_with_custom_features(new_entity("MQTT_DEVICE.tv"));
        let record = catalog.get_entity("MQTT_DEVICE.tv").unwrap();
        assert_eq!(record.state, EntityState::Offline);
        assert!(!record.is_on());
        assert_eq!(record.command_name(1), Some("FOO_BAR"));
        assert_eq!(record.command_name(2), None);
        assert!(catalog.get_entity("MQTT_DEVICE.radio").is_none());
    }

    #[test]
    fn test_set_state_unknown_entity() {
        let catalog = InMemoryCatalog::new();
        assert!(!catalog.set_state("MQTT_ACTIVITY.x", EntityState::Online));
        catalog.add_entity_with_custom_features(new_entity("MQTT_ACTIVITY.x"));
        assert!(catalog.set_state("MQTT_ACTIVITY.x", EntityState::Online));
        assert!(catalog.get_entity("MQTT_ACTIVITY.x").unwrap().is_on());
    }

    #[test]
    fn test_update_features_keeps_state() {
        let catalog = InMemoryCatalog::new();
        catalog.add_entity_with_custom_features(new_entity("MQTT_ACTIVITY.x"));
        catalog.set_state("MQTT_ACTIVITY.x", EntityState::Online);
        catalog.update_entity_features("MQTT_ACTIVITY.x", vec![], vec!["A".into()]);
        let record = catalog.get_entity("MQTT_ACTIVITY.x").unwrap();
        assert!(record.supported_features.is_empty());
        assert_eq!(record.custom_features, ["A"]);
        assert_eq!(record.state, EntityState::Online);
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&EntityState::Online).unwrap(),
            "\"ONLINE\""
        );
    }
}
