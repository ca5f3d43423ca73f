//! Live entity representation.
//!
//! Entities live in an arena (`EntityStore`) and reference each other by
//! `EntityId` index, never by direct reference, so cyclic graphs (Patient ->
//! Record -> Pregnancy -> Delivery -> Patient) are representable without
//! ownership cycles.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::entity_registry::OutgoingRelation;

pub type JsonMap = serde_json::Map<String, Value>;

/// Stable index of an entity within its store. Slots are tombstoned on
/// delete, so ids are never reused within a store's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) u32);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// One relation field on a live entity: the declared edge plus the currently
/// connected targets. Singleton slots hold at most one target.
#[derive(Debug, Clone)]
pub struct RelationSlot {
    pub relation: OutgoingRelation,
    pub targets: Vec<EntityId>,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub label: String,
    pub uuid: String,
    pub created: DateTime<Utc>,
    pub created_by: Option<String>,
    pub modified: DateTime<Utc>,
    pub modified_by: Option<String>,
    pub properties: JsonMap,
    pub(crate) relations: BTreeMap<String, RelationSlot>,
}

impl Entity {
    pub fn relation_slot(&self, field: &str) -> Option<&RelationSlot> {
        self.relations.get(field)
    }

    pub(crate) fn relation_slot_mut(&mut self, field: &str) -> Option<&mut RelationSlot> {
        self.relations.get_mut(field)
    }

    pub fn has_relation(&self, field: &str) -> bool {
        self.relations.contains_key(field)
    }

    pub fn property(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }

    /// The single connected target of a singleton (or first of a list) slot.
    pub fn single_target(&self, field: &str) -> Option<EntityId> {
        self.relations
            .get(field)
            .and_then(|slot| slot.targets.first().copied())
    }

    pub fn targets(&self, field: &str) -> &[EntityId] {
        self.relations
            .get(field)
            .map(|slot| slot.targets.as_slice())
            .unwrap_or(&[])
    }

    /// Identifier metadata as packed into every serialized representation.
    pub fn pack_identifier(&self) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("uuid".to_string(), Value::String(self.uuid.clone()));
        map.insert(
            "created".to_string(),
            Value::String(self.created.to_rfc3339()),
        );
        map.insert(
            "created_by".to_string(),
            self.created_by
                .as_ref()
                .map(|v| Value::String(v.clone()))
                .unwrap_or(Value::Null),
        );
        map.insert(
            "modified".to_string(),
            Value::String(self.modified.to_rfc3339()),
        );
        map.insert(
            "modified_by".to_string(),
            self.modified_by
                .as_ref()
                .map(|v| Value::String(v.clone()))
                .unwrap_or(Value::Null),
        );
        map
    }
}
