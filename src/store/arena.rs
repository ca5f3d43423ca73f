//! The entity arena.
//!
//! Holds every live entity for a request (or a test fixture) and hands out
//! stable `EntityId` indices. Persistence is modeled as a journal of per-node
//! writes: each `persist` call appends the entity id, mirroring the one
//! driver write the engines issue per mutated node. There is no wrapping
//! transaction; writes journaled before an error stay journaled.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::entity_registry::EntityRegistry;
use crate::mutation::errors::MutationError;

use super::entity::{Entity, EntityId, JsonMap, RelationSlot};

pub struct EntityStore {
    registry: Arc<EntityRegistry>,
    entities: Vec<Option<Entity>>,
    by_uuid: HashMap<String, EntityId>,
    journal: Vec<EntityId>,
}

impl EntityStore {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        EntityStore {
            registry,
            entities: Vec::new(),
            by_uuid: HashMap::new(),
            journal: Vec::new(),
        }
    }

    pub fn registry(&self) -> Arc<EntityRegistry> {
        Arc::clone(&self.registry)
    }

    /// Create a new entity of `label` from scalar properties.
    ///
    /// A caller-supplied `uuid` property is honored, otherwise a v4 uuid is
    /// generated. Scalar setters registered for the label are applied.
    /// Relation fields are not accepted here; the patch engine connects
    /// relations separately.
    pub fn create(&mut self, label: &str, props: JsonMap) -> Result<EntityId, MutationError> {
        let schema = self.registry.schema(label)?.clone();

        let mut props = props;
        let uuid = match props.remove("uuid") {
            Some(Value::String(u)) => u,
            Some(other) => {
                return Err(MutationError::type_mismatch(
                    "uuid",
                    format!("expected a uuid string, got {other}"),
                ))
            }
            None => Uuid::new_v4().to_string(),
        };

        let mut properties = JsonMap::new();
        for (key, value) in props {
            if schema.relation_by_field(&key).is_some() {
                return Err(MutationError::type_mismatch(
                    key,
                    "relation fields cannot be set as scalar properties",
                ));
            }
            if !schema.has_property(&key) {
                return Err(MutationError::UnknownAttribute {
                    label: label.to_string(),
                    field: key,
                });
            }
            let stored = match self.registry.setter(label, &key) {
                Some(setter) => {
                    setter(&value).map_err(|message| MutationError::type_mismatch(&key, message))?
                }
                None => value,
            };
            properties.insert(key, stored);
        }

        let relations = schema
            .relations
            .iter()
            .map(|rel| {
                (
                    rel.field_name.clone(),
                    RelationSlot {
                        relation: rel.clone(),
                        targets: Vec::new(),
                    },
                )
            })
            .collect();

        let id = EntityId(self.entities.len() as u32);
        let now = Utc::now();
        let entity = Entity {
            id,
            label: label.to_string(),
            uuid: uuid.clone(),
            created: now,
            created_by: None,
            modified: now,
            modified_by: None,
            properties,
            relations,
        };
        self.entities.push(Some(entity));
        self.by_uuid.insert(uuid, id);
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// Panics if the id has been deleted; engines only hold live ids.
    pub fn entity(&self, id: EntityId) -> &Entity {
        self.get(id).expect("entity id is live")
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        self.entities
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .expect("entity id is live")
    }

    pub fn find_by_uuid(&self, uuid: &str) -> Option<EntityId> {
        self.by_uuid.get(uuid).copied()
    }

    /// Resolve a uuid to an entity of the expected label, not-found on miss.
    pub fn require_by_uuid(&self, label: &str, uuid: &str) -> Result<EntityId, MutationError> {
        match self.find_by_uuid(uuid) {
            Some(id) if self.entity(id).label == label => Ok(id),
            _ => Err(MutationError::not_found(label, uuid)),
        }
    }

    pub fn is_connected(&self, parent: EntityId, field: &str, child: EntityId) -> bool {
        self.entity(parent)
            .relation_slot(field)
            .map(|slot| slot.targets.contains(&child))
            .unwrap_or(false)
    }

    /// Connect `child` under the parent's relation field. Idempotent; a
    /// singleton slot replaces its current target.
    pub fn connect(
        &mut self,
        parent: EntityId,
        field: &str,
        child: EntityId,
    ) -> Result<(), MutationError> {
        let parent_label = self.entity(parent).label.clone();
        let slot = self
            .entity_mut(parent)
            .relation_slot_mut(field)
            .ok_or(MutationError::UnknownAttribute {
                label: parent_label,
                field: field.to_string(),
            })?;
        if slot.relation.cardinality.is_singleton() {
            slot.targets.clear();
            slot.targets.push(child);
        } else if !slot.targets.contains(&child) {
            slot.targets.push(child);
        }
        Ok(())
    }

    pub fn disconnect(
        &mut self,
        parent: EntityId,
        field: &str,
        child: EntityId,
    ) -> Result<(), MutationError> {
        let parent_label = self.entity(parent).label.clone();
        let slot = self
            .entity_mut(parent)
            .relation_slot_mut(field)
            .ok_or(MutationError::UnknownAttribute {
                label: parent_label,
                field: field.to_string(),
            })?;
        slot.targets.retain(|t| *t != child);
        Ok(())
    }

    /// Tombstone the entity and scrub every reference to it.
    pub fn delete(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(id.index()).and_then(Option::take) {
            self.by_uuid.remove(&entity.uuid);
        }
        for slot in self.entities.iter_mut().flatten() {
            for relation in slot.relations.values_mut() {
                relation.targets.retain(|t| *t != id);
            }
        }
    }

    /// One driver write for this node. Appends to the journal; the journal is
    /// the observable record of what would have been committed before any
    /// subsequent error.
    pub fn persist(&mut self, id: EntityId) {
        self.journal.push(id);
    }

    pub fn journal(&self) -> &[EntityId] {
        &self.journal
    }

    pub fn touch_modified(&mut self, id: EntityId) {
        self.entity_mut(id).modified = Utc::now();
    }

    /// Set a declared scalar property, applying any registered setter
    /// (setters may coerce formats, e.g. parse dates).
    pub fn set_property(
        &mut self,
        id: EntityId,
        field: &str,
        value: Value,
    ) -> Result<(), MutationError> {
        let label = self.entity(id).label.clone();
        if !self.registry.schema(&label)?.has_property(field) {
            return Err(MutationError::UnknownAttribute {
                label,
                field: field.to_string(),
            });
        }
        let stored = match self.registry.setter(&label, field) {
            Some(setter) => {
                setter(&value).map_err(|message| MutationError::type_mismatch(field, message))?
            }
            None => value,
        };
        self.entity_mut(id).properties.insert(field.to_string(), stored);
        Ok(())
    }

    /// Reverse lookup: the entity holding `child` through a relation of
    /// `relation_type`. Used by hooks that need their owning aggregate
    /// (e.g. a Dose finding its ManagementPlan).
    pub fn find_owner(&self, child: EntityId, relation_type: &str) -> Option<EntityId> {
        self.entities.iter().flatten().find_map(|entity| {
            entity
                .relations
                .values()
                .any(|slot| {
                    slot.relation.relation_type == relation_type && slot.targets.contains(&child)
                })
                .then_some(entity.id)
        })
    }

    pub fn live_count(&self) -> usize {
        self.entities.iter().flatten().count()
    }

    pub fn iter_live(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().flatten()
    }
}
