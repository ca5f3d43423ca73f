//! Recursive delete engine.
//!
//! Applies a partial-removal tree to a live entity. Bare uuid strings only
//! detach; a map item whose sole key is `uuid` detaches and deletes the
//! related entity (subject to its pre-delete hook); a map item with extra
//! keys recurses removal into that entity instead. Persistence is per
//! top-level key, with the same non-transactional caveat as patching.

use serde_json::Value;

use crate::entity_registry::OutgoingRelation;
use crate::store::{EntityId, EntityStore, JsonMap};

use super::errors::MutationError;
use super::patch::{check_permitted, connected_target_by_uuid};
use super::tree::{parse_delete_value, DeleteItem, DeleteValue};

/// Remove parts of `id`'s subtree as described by `tree`.
pub fn recursive_delete(
    store: &mut EntityStore,
    id: EntityId,
    tree: JsonMap,
) -> Result<(), MutationError> {
    let registry = store.registry();
    let label = store.entity(id).label.clone();

    for (key, raw_value) in tree {
        log::debug!("Removing '{key}' on label '{label}'");

        let schema = registry.schema(&label)?;
        let relation = schema.relation_by_field(&key).cloned();
        if relation.is_none() && !schema.has_property(&key) {
            return Err(MutationError::UnknownAttribute {
                label: label.clone(),
                field: key,
            });
        }

        match (parse_delete_value(&key, raw_value)?, relation) {
            (DeleteValue::Object(map), Some(rel)) => {
                let target = store.entity(id).single_target(&key).ok_or_else(|| {
                    MutationError::not_found(&rel.target_label, "<not connected>")
                })?;
                recursive_delete(store, target, map)?;
            }
            (DeleteValue::Object(_), None) => {
                return Err(MutationError::type_mismatch(
                    &key,
                    "nested removal requires a relation field",
                ));
            }
            (DeleteValue::Items(items), Some(rel)) => {
                delete_relation_items(store, id, &key, &rel, items)?;
            }
            (DeleteValue::Items(items), None) => {
                remove_scalar_values(store, id, &key, items)?;
            }
            (DeleteValue::Scalar(_), _) => {
                log::debug!("Nothing to remove for scalar '{key}' on label '{label}'");
            }
        }

        store.persist(id);
    }
    Ok(())
}

fn delete_relation_items(
    store: &mut EntityStore,
    parent: EntityId,
    field: &str,
    relation: &OutgoingRelation,
    items: Vec<DeleteItem>,
) -> Result<(), MutationError> {
    let registry = store.registry();
    for item in items {
        match item {
            // Detach only; the entity itself is untouched. A uuid that does
            // not resolve is silently skipped.
            DeleteItem::Text(uuid) => {
                check_permitted(&registry, field)?;
                if let Some(target) = store.find_by_uuid(&uuid) {
                    if store.entity(target).label == relation.target_label {
                        store.disconnect(parent, field, target)?;
                    }
                }
            }
            DeleteItem::Delete { uuid } => {
                let target = connected_target_by_uuid(store, parent, field, &uuid)
                    .ok_or_else(|| MutationError::not_found(&relation.target_label, &uuid))?;
                let vetoed = match registry.hooks(&relation.target_label) {
                    Some(hooks) => !hooks.on_pre_delete(store, target)?,
                    None => false,
                };
                if vetoed {
                    log::debug!(
                        "Deletion of {} `{uuid}` vetoed by its pre-delete hook",
                        relation.target_label
                    );
                    continue;
                }
                store.disconnect(parent, field, target)?;
                store.delete(target);
            }
            // Extra keys mean the uuid is for identity only: recurse, do not
            // delete.
            DeleteItem::Recurse { uuid, rest } => {
                let target = connected_target_by_uuid(store, parent, field, &uuid)
                    .ok_or_else(|| MutationError::not_found(&relation.target_label, &uuid))?;
                recursive_delete(store, target, rest)?;
            }
        }
    }
    Ok(())
}

/// Remove matching string values from a plain scalar-list attribute.
fn remove_scalar_values(
    store: &mut EntityStore,
    id: EntityId,
    field: &str,
    items: Vec<DeleteItem>,
) -> Result<(), MutationError> {
    let mut to_remove = Vec::with_capacity(items.len());
    for item in items {
        match item {
            DeleteItem::Text(text) => to_remove.push(text),
            _ => {
                return Err(MutationError::type_mismatch(
                    field,
                    "Can only delete from a list of objects or strings",
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
    current.retain(|value| {
        !to_remove
            .iter()
            .any(|removed| value.as_str() == Some(removed.as_str()))
    });
    store.set_property(id, field, Value::Array(current))
}
