//! Activity exclusivity tracking.
//!
//! Every "current activity" notification re-asserts that only the named activity is
//! online. Nothing prevents two activities from looking online between notifications;
//! the peer is expected to send a fresh notification after each (de)activation.

use crate::catalog::{EntityCatalog, EntityState};
use crate::registry::EntityCategory;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// One state change performed while applying a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub entity_id: String,
    pub state: EntityState,
}

/// Apply a current-activity payload (the bare activity name) to every known activity.
pub fn apply_current_activity(
    catalog: &dyn EntityCatalog,
    known_activities: &BTreeSet<String>,
    payload: &str,
) -> Vec<Transition> {
    let target = EntityCategory::Activity.entity_id(payload.trim());
    info!(target_activity = %target, "Current activity changed");

    let mut transitions = Vec::new();
    for entity_id in known_activities {
        let Some(entity) = catalog.get_entity(entity_id) else {
            debug!(entity_id = %entity_id, "Activity not in catalog, skipping");
            continue;
        };
        let next = if *entity_id == target {
            (entity.state != EntityState::Online).then_some(EntityState::Online)
        } else {
            entity.is_on().then_some(EntityState::Offline)
        };
        if let Some(state) = next {
            if catalog.set_state(entity_id, state) {
                transitions.push(Transition {
                    entity_id: entity_id.clone(),
                    state,
                });
            }
        }
    }
    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, NewEntity, REMOTE_KIND};

    fn catalog_with(ids: &[&str]) -> (InMemoryCatalog, BTreeSet<String>) {
        let catalog = InMemoryCatalog::new();
        let mut known = BTreeSet::new();
        for id in ids {
            catalog.add_entity_with_custom_features(NewEntity {
                entity_id: id.to_string(),
                kind: REMOTE_KIND.into(),
                integration_id: "mqtt".into(),
                friendly_name: id.to_string(),
                supported_features: vec![],
                custom_features: vec![],
            });
            known.insert(id.to_string());
        }
        (catalog, known)
    }

    fn online(catalog: &InMemoryCatalog) -> Vec<String> {
        catalog
            .entities()
            .into_iter()
            .filter(|e| e.is_on())
            .map(|e| e.entity_id)
            .collect()
    }

    #[test]
    fn test_exactly_one_activity_online() {
        let (catalog, known) = catalog_with(&[
            "MQTT_ACTIVITY.listen_music",
            "MQTT_ACTIVITY.play_game",
            "MQTT_ACTIVITY.watch_tv",
        ]);
        catalog.set_state("MQTT_ACTIVITY.listen_music", EntityState::Online);
        catalog.set_state("MQTT_ACTIVITY.play_game", EntityState::Online);

        let transitions = apply_current_activity(&catalog, &known, "watch_tv");
        assert_eq!(online(&catalog), ["MQTT_ACTIVITY.watch_tv"]);
        assert_eq!(transitions.len(), 3);
        assert!(transitions.contains(&Transition {
            entity_id: "MQTT_ACTIVITY.play_game".into(),
            state: EntityState::Offline,
        }));
    }

    #[test]
    fn test_repeat_notification_is_noop() {
        let (catalog, known) = catalog_with(&["MQTT_ACTIVITY.a", "MQTT_ACTIVITY.b"]);
        apply_current_activity(&catalog, &known, "a");
        let transitions = apply_current_activity(&catalog, &known, "a\n");
        assert!(transitions.is_empty());
        assert_eq!(online(&catalog), ["MQTT_ACTIVITY.a"]);
    }

    #[test]
    fn test_unknown_target_turns_everything_off() {
        let (catalog, known) = catalog_with(&["MQTT_ACTIVITY.a"]);
        catalog.set_state("MQTT_ACTIVITY.a", EntityState::Online);
        apply_current_activity(&catalog, &known, "PowerOff");
        assert!(online(&catalog).is_empty());
    }

    #[test]
    fn test_entities_missing_from_catalog_are_skipped() {
        let (catalog, mut known) = catalog_with(&["MQTT_ACTIVITY.a"]);
        known.insert("MQTT_ACTIVITY.ghost".into());
        let transitions = apply_current_activity(&catalog, &known, "ghost");
        assert!(transitions.is_empty());
        assert!(catalog.get_entity("MQTT_ACTIVITY.ghost").is_none());
    }
}
