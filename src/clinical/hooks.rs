//! Lifecycle hooks for clinical entity types.

use serde_json::Value;

use crate::mutation::errors::MutationError;
use crate::store::{EntityHooks, EntityId, EntityStore, JsonMap};

// "Other - please specify" SNOMED sentinels. The free-text companion field
// only survives while its governing coded field holds the sentinel.
const EDUCATION_OTHER_SCT: &str = "365460000";
const ETHNICITY_OTHER_SCT: &str = "186023009";
const ACCESSIBILITY_OTHER_CODE: &str = "D0000032";

pub struct PatientHooks;

impl EntityHooks for PatientHooks {
    fn on_pre_patch(
        &self,
        store: &mut EntityStore,
        id: EntityId,
        tree: &mut JsonMap,
    ) -> Result<(), MutationError> {
        if tree.get("highest_education_level").and_then(Value::as_str)
            != Some(EDUCATION_OTHER_SCT)
        {
            tree.remove("highest_education_level_other");
            store.set_property(id, "highest_education_level_other", Value::Null)?;
        }

        if tree.get("ethnicity").and_then(Value::as_str) == Some(ETHNICITY_OTHER_SCT) {
            let other = tree
                .remove("ethnicity_other")
                .unwrap_or_else(|| Value::String(String::new()));
            store.set_property(id, "ethnicity_other", other)?;
        } else {
            tree.remove("ethnicity_other");
            store.set_property(id, "ethnicity_other", Value::Null)?;
        }

        let has_other_consideration = tree
            .get("accessibility_considerations")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .any(|v| v.as_str() == Some(ACCESSIBILITY_OTHER_CODE))
            })
            .unwrap_or(false);
        if !has_other_consideration {
            tree.remove("accessibility_considerations_other");
            store.set_property(id, "accessibility_considerations_other", Value::Null)?;
        }
        Ok(())
    }
}

const DOSE_FIELDS: [&str; 3] = ["medication_id", "dose_amount", "routine_sct_code"];

/// Doses keep an audit trail: every change is snapshotted into a connected
/// DoseChange, and inserts/deletes are recorded as DoseHistory entries on
/// the owning ManagementPlan. Deletion is always vetoed; the dose is only
/// ever detached from its plan so history stays intact.
pub struct DoseHooks;

impl EntityHooks for DoseHooks {
    fn on_pre_patch(
        &self,
        store: &mut EntityStore,
        id: EntityId,
        tree: &mut JsonMap,
    ) -> Result<(), MutationError> {
        let mut change = JsonMap::new();
        let mut touched = false;
        for field in DOSE_FIELDS {
            let Some(new_value) = tree.remove(field) else {
                continue;
            };
            touched = true;
            let current = store
                .entity(id)
                .property(field)
                .cloned()
                .unwrap_or(Value::Null);
            if new_value != current {
                change.insert(field.to_string(), new_value.clone());
                store.set_property(id, field, new_value)?;
            }
        }
        if touched {
            record_dose_change(store, id, change)?;
        }
        Ok(())
    }

    fn on_create(&self, store: &mut EntityStore, id: EntityId) -> Result<(), MutationError> {
        let mut snapshot = JsonMap::new();
        for field in DOSE_FIELDS {
            if let Some(value) = store.entity(id).property(field) {
                if !value.is_null() {
                    snapshot.insert(field.to_string(), value.clone());
                }
            }
        }
        record_dose_change(store, id, snapshot)?;

        let plan = owning_plan(store, id)?;
        record_dose_history(store, plan, id, "insert")
    }

    fn on_pre_delete(
        &self,
        store: &mut EntityStore,
        id: EntityId,
    ) -> Result<bool, MutationError> {
        let plan = owning_plan(store, id)?;
        record_dose_history(store, plan, id, "delete")?;
        store.disconnect(plan, "doses", id)?;
        store.persist(plan);
        Ok(false)
    }
}

fn record_dose_change(
    store: &mut EntityStore,
    dose: EntityId,
    fields: JsonMap,
) -> Result<(), MutationError> {
    let change = store.create("DoseChange", fields)?;
    store.persist(change);
    store.connect(dose, "changes", change)
}

fn owning_plan(store: &EntityStore, dose: EntityId) -> Result<EntityId, MutationError> {
    store
        .find_owner(dose, "HAS_DOSE")
        .ok_or_else(|| MutationError::not_found("ManagementPlan", &store.entity(dose).uuid))
}

fn record_dose_history(
    store: &mut EntityStore,
    plan: EntityId,
    dose: EntityId,
    action: &str,
) -> Result<(), MutationError> {
    let mut props = JsonMap::new();
    props.insert("action".to_string(), Value::String(action.to_string()));
    let entry = store.create("DoseHistory", props)?;
    store.connect(entry, "dose", dose)?;
    store.persist(entry);
    store.connect(plan, "dose_history", entry)?;
    store.persist(plan);
    Ok(())
}
