//! Recursive patch engine.
//!
//! Applies a partial-update tree to a live entity: scalars, embedded values,
//! and to-one/to-many relations with create/connect/sync semantics. Each
//! mutated node is persisted individually; there is no wrapping transaction,
//! so an error mid-tree leaves earlier writes committed.

use std::collections::HashSet;

use serde_json::Value;

use crate::config;
use crate::entity_registry::{EntityRegistry, OutgoingRelation};
use crate::store::{EntityId, EntityStore, JsonMap};

use super::errors::MutationError;
use super::tree::{parse_patch_value, PatchItem, PatchValue};

/// Patch `id` with `tree`.
///
/// The entity's pre-patch hook runs first and may rewrite or strip the tree.
/// Keys are then applied in order; the first error aborts the remaining keys.
/// After all keys, modification metadata is touched and the node persisted.
pub fn recursive_patch(
    store: &mut EntityStore,
    id: EntityId,
    tree: JsonMap,
) -> Result<(), MutationError> {
    let registry = store.registry();
    let label = store.entity(id).label.clone();

    let mut tree = tree;
    if let Some(hooks) = registry.hooks(&label) {
        hooks.on_pre_patch(store, id, &mut tree)?;
    }

    for (key, raw_value) in tree {
        log::debug!("Patching '{key}' on label '{label}'");

        if registry.is_skipped(&label, &key) {
            continue;
        }
        if registry.is_immutable(&key) {
            log::warn!("Field '{key}' cannot be patched on label '{label}'");
            return Err(MutationError::ImmutableField { field: key });
        }

        let schema = registry.schema(&label)?;
        let relation = schema.relation_by_field(&key).cloned();
        if relation.is_none() && !schema.has_property(&key) {
            return Err(MutationError::UnknownAttribute {
                label: label.clone(),
                field: key,
            });
        }

        match (parse_patch_value(&key, raw_value)?, relation) {
            // Embedded opaque value: set the whole map as a scalar.
            (PatchValue::Object(map), None) => {
                store.set_property(id, &key, Value::Object(map))?;
            }
            (PatchValue::Object(map), Some(rel)) => {
                patch_singleton_relation(store, &registry, id, &key, &rel, map)?;
            }
            (PatchValue::Items(items), Some(rel)) => {
                patch_relation_items(store, &registry, id, &key, &rel, items)?;
            }
            (PatchValue::Items(items), None) => {
                patch_scalar_list(store, id, &key, items)?;
            }
            // A scalar against a relation field is a uuid reference.
            (PatchValue::Scalar(value), Some(rel)) => {
                let uuid = match value {
                    Value::String(uuid) => uuid,
                    other => {
                        return Err(MutationError::type_mismatch(
                            &key,
                            format!("expected a uuid string, got {other}"),
                        ))
                    }
                };
                connect_reference(store, &registry, id, &key, &rel, &uuid)?;
            }
            (PatchValue::Scalar(value), None) => {
                store.set_property(id, &key, value)?;
            }
        }
    }

    store.touch_modified(id);
    store.persist(id);
    Ok(())
}

/// A map against a relation field. With a `uuid` key the referenced entity
/// replaces the current target (and any remaining keys patch it); without
/// one, patching recurses into the current singleton target.
fn patch_singleton_relation(
    store: &mut EntityStore,
    registry: &EntityRegistry,
    parent: EntityId,
    field: &str,
    relation: &OutgoingRelation,
    mut map: JsonMap,
) -> Result<(), MutationError> {
    match map.remove("uuid") {
        Some(Value::String(uuid)) => {
            connect_reference(store, registry, parent, field, relation, &uuid)?;
            if !map.is_empty() {
                let target = store.require_by_uuid(&relation.target_label, &uuid)?;
                recursive_patch(store, target, map)?;
            }
            Ok(())
        }
        Some(other) => Err(MutationError::type_mismatch(
            field,
            format!("expected a uuid string, got {other}"),
        )),
        None => {
            let target = store.entity(parent).single_target(field).ok_or_else(|| {
                MutationError::not_found(&relation.target_label, "<not connected>")
            })?;
            recursive_patch(store, target, map)
        }
    }
}

/// Resolve `uuid` and connect it, honoring the overwrite-existing policy:
/// overwrite-listed relations disconnect every other current target first.
fn connect_reference(
    store: &mut EntityStore,
    registry: &EntityRegistry,
    parent: EntityId,
    field: &str,
    relation: &OutgoingRelation,
    uuid: &str,
) -> Result<(), MutationError> {
    check_permitted(registry, field)?;
    let target = store.require_by_uuid(&relation.target_label, uuid)?;
    if registry.overwrites_existing(field) {
        let current: Vec<EntityId> = store.entity(parent).targets(field).to_vec();
        for other in current {
            if other != target {
                store.disconnect(parent, field, other)?;
            }
        }
    }
    if !store.is_connected(parent, field, target) {
        store.connect(parent, field, target)?;
    }
    Ok(())
}

fn patch_relation_items(
    store: &mut EntityStore,
    registry: &EntityRegistry,
    parent: EntityId,
    field: &str,
    relation: &OutgoingRelation,
    items: Vec<PatchItem>,
) -> Result<(), MutationError> {
    if registry.overwrites_existing(field) {
        // Full sync: drop current targets not referenced by uuid in the new
        // list. Only bare uuid strings count as references.
        let referenced: HashSet<&str> = items
            .iter()
            .filter_map(|item| match item {
                PatchItem::Text(uuid) => Some(uuid.as_str()),
                _ => None,
            })
            .collect();
        let current: Vec<EntityId> = store.entity(parent).targets(field).to_vec();
        for target in current {
            if !referenced.contains(store.entity(target).uuid.as_str()) {
                store.disconnect(parent, field, target)?;
            }
        }
    }

    for item in items {
        match item {
            PatchItem::Text(uuid) => {
                connect_reference(store, registry, parent, field, relation, &uuid)?;
            }
            PatchItem::Existing { uuid, rest } => {
                let target = connected_target_by_uuid(store, parent, field, &uuid)
                    .ok_or_else(|| MutationError::not_found(&relation.target_label, &uuid))?;
                recursive_patch(store, target, rest)?;
            }
            PatchItem::New(map) => {
                check_permitted(registry, field)?;
                create_and_connect(store, registry, parent, field, relation, map)?;
            }
        }
    }
    Ok(())
}

/// Construct, persist and connect a new related entity, then run its
/// creation hook. Nested relation sub-trees in the payload are applied to
/// the new entity by a recursive patch before it is connected.
fn create_and_connect(
    store: &mut EntityStore,
    registry: &EntityRegistry,
    parent: EntityId,
    field: &str,
    relation: &OutgoingRelation,
    map: JsonMap,
) -> Result<(), MutationError> {
    let target_schema = registry.schema(&relation.target_label)?;
    let mut scalars = JsonMap::new();
    let mut nested = JsonMap::new();
    for (key, value) in map {
        if target_schema.relation_by_field(&key).is_some() {
            nested.insert(key, value);
        } else {
            scalars.insert(key, value);
        }
    }

    let new_id = store.create(&relation.target_label, scalars)?;
    store.persist(new_id);
    if !nested.is_empty() {
        recursive_patch(store, new_id, nested)?;
    }
    store.connect(parent, field, new_id)?;
    if let Some(hooks) = registry.hooks(&relation.target_label) {
        hooks.on_create(store, new_id)?;
    }
    Ok(())
}

/// Append-only de-duplication against a plain scalar-list attribute.
fn patch_scalar_list(
    store: &mut EntityStore,
    id: EntityId,
    field: &str,
    items: Vec<PatchItem>,
) -> Result<(), MutationError> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        match item {
            PatchItem::Text(text) => values.push(text),
            _ => {
                return Err(MutationError::type_mismatch(
                    field,
                    "List elements should be strings",
                ))
            }
        }
    }

    let mut current: Vec<Value> = match store.entity(id).property(field) {
        Some(Value::Array(existing)) => existing.clone(),
        Some(other) => {
            return Err(MutationError::type_mismatch(
                field,
                format!("expected a list attribute, got {other}"),
            ))
        }
        None => Vec::new(),
    };
    for value in values {
        if !current.iter().any(|v| v.as_str() == Some(value.as_str())) {
            current.push(Value::String(value));
        }
    }
    store.set_property(id, field, Value::Array(current))?;
    store.persist(id);
    Ok(())
}

pub(crate) fn connected_target_by_uuid(
    store: &EntityStore,
    parent: EntityId,
    field: &str,
    uuid: &str,
) -> Option<EntityId> {
    store
        .entity(parent)
        .targets(field)
        .iter()
        .copied()
        .find(|target| store.entity(*target).uuid == uuid)
}

pub(crate) fn check_permitted(
    registry: &EntityRegistry,
    field: &str,
) -> Result<(), MutationError> {
    if config::enforce_permitted_relations() && !registry.is_permitted_relation(field) {
        return Err(MutationError::RelationNotPermitted {
            field: field.to_string(),
        });
    }
    Ok(())
}
