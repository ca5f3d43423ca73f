//! The process-wide entity registry.
//!
//! Holds the statically declared schema for every entity label, plus the
//! per-label behavior the engines consult at runtime: mutation policy sets,
//! scalar setters, lifecycle hooks, response shapes and projections.
//!
//! The relation cache is read-mostly shared state. It is filled lazily, one
//! label at a time, by a depth-first walk over the labels reachable from the
//! requested one. Filling is idempotent, so two threads racing to warm the
//! same entry is harmless.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::errors::SchemaError;
use super::schema::{EntitySchema, OutgoingRelation};
use crate::materializer::{ProjectionFn, ResponseShape};
use crate::store::hooks::EntityHooks;

/// Coerces a raw scalar into its stored form (e.g. ISO-8601 date parsing).
/// An `Err` carries the mismatch message surfaced to the caller.
pub type SetterFn = fn(&Value) -> Result<Value, String>;

#[derive(Default)]
pub struct EntityRegistry {
    schemas: HashMap<String, EntitySchema>,
    relation_cache: RwLock<HashMap<String, Arc<Vec<OutgoingRelation>>>>,
    hooks: HashMap<String, Arc<dyn EntityHooks>>,
    shapes: HashMap<String, ResponseShape>,
    projections: HashMap<String, ProjectionFn>,
    setters: HashMap<(String, String), SetterFn>,
    immutable_fields: HashSet<String>,
    skip_fields: HashSet<(String, String)>,
    overwrite_relations: HashSet<String>,
    permitted_relations: HashSet<String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        EntityRegistry::default()
    }

    /// Declare one entity schema. Labels must be unique.
    pub fn declare(&mut self, schema: EntitySchema) -> Result<(), SchemaError> {
        if self.schemas.contains_key(&schema.label) {
            return Err(SchemaError::DuplicateLabel {
                label: schema.label.clone(),
            });
        }
        self.schemas.insert(schema.label.clone(), schema);
        Ok(())
    }

    pub fn schema(&self, label: &str) -> Result<&EntitySchema, SchemaError> {
        self.schemas.get(label).ok_or_else(|| SchemaError::UnknownLabel {
            label: label.to_string(),
        })
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.schemas.contains_key(label)
    }

    /// Outgoing relations for `label`, memoized process-wide.
    ///
    /// The first call for a label walks every label reachable from it depth
    /// first and caches each one, so a subsequent query compilation touches
    /// the cache only. Cycles in the schema (Patient -> ... -> Delivery ->
    /// Patient) are broken by inserting a label's entry before following its
    /// targets.
    pub fn resolve(&self, label: &str) -> Result<Arc<Vec<OutgoingRelation>>, SchemaError> {
        {
            let cache = self.relation_cache.read().expect("relation cache poisoned");
            if let Some(hit) = cache.get(label) {
                return Ok(Arc::clone(hit));
            }
        }
        self.fill_cache(label)?;
        let cache = self.relation_cache.read().expect("relation cache poisoned");
        Ok(Arc::clone(cache.get(label).expect("entry filled above")))
    }

    fn fill_cache(&self, label: &str) -> Result<(), SchemaError> {
        let schema = self.schema(label)?;
        for rel in &schema.relations {
            if !self.schemas.contains_key(&rel.target_label) {
                return Err(SchemaError::UnknownTarget {
                    label: label.to_string(),
                    relation_type: rel.relation_type.clone(),
                    target_label: rel.target_label.clone(),
                });
            }
        }
        let relations = Arc::new(schema.relations.clone());
        {
            let mut cache = self.relation_cache.write().expect("relation cache poisoned");
            cache.insert(label.to_string(), relations);
        }
        for rel in &schema.relations {
            let cached = {
                let cache = self.relation_cache.read().expect("relation cache poisoned");
                cache.contains_key(&rel.target_label)
            };
            if !cached {
                self.fill_cache(&rel.target_label)?;
            }
        }
        Ok(())
    }

    // ---- mutation policy ----

    /// Fields that may never be patched, on any label.
    pub fn mark_immutable(&mut self, fields: &[&str]) {
        self.immutable_fields
            .extend(fields.iter().map(|f| f.to_string()));
    }

    pub fn is_immutable(&self, field: &str) -> bool {
        self.immutable_fields.contains(field)
    }

    /// Patching `field` on `label` is silently ignored.
    pub fn mark_skipped(&mut self, label: &str, field: &str) {
        self.skip_fields
            .insert((label.to_string(), field.to_string()));
    }

    pub fn is_skipped(&self, label: &str, field: &str) -> bool {
        self.skip_fields
            .contains(&(label.to_string(), field.to_string()))
    }

    /// Relations where a patched reference list replaces the existing set
    /// (full sync) instead of adding to it.
    pub fn mark_overwrite(&mut self, field: &str) {
        self.overwrite_relations.insert(field.to_string());
    }

    pub fn overwrites_existing(&self, field: &str) -> bool {
        self.overwrite_relations.contains(field)
    }

    /// Relation fields that patch/delete trees may connect or create through.
    pub fn permit_relations(&mut self, fields: &[&str]) {
        self.permitted_relations
            .extend(fields.iter().map(|f| f.to_string()));
    }

    pub fn is_permitted_relation(&self, field: &str) -> bool {
        self.permitted_relations.contains(field)
    }

    // ---- scalar setters ----

    pub fn register_setter(&mut self, label: &str, field: &str, setter: SetterFn) {
        self.setters
            .insert((label.to_string(), field.to_string()), setter);
    }

    pub fn setter(&self, label: &str, field: &str) -> Option<SetterFn> {
        self.setters
            .get(&(label.to_string(), field.to_string()))
            .copied()
    }

    // ---- hooks ----

    pub fn register_hooks(&mut self, label: &str, hooks: Arc<dyn EntityHooks>) {
        self.hooks.insert(label.to_string(), hooks);
    }

    pub fn hooks(&self, label: &str) -> Option<Arc<dyn EntityHooks>> {
        self.hooks.get(label).cloned()
    }

    // ---- materialization ----

    pub fn register_shape(&mut self, label: &str, shape: ResponseShape) {
        self.shapes.insert(label.to_string(), shape);
    }

    pub fn shape(&self, label: &str) -> Option<&ResponseShape> {
        self.shapes.get(label)
    }

    pub fn register_projection(&mut self, label: &str, projection: ProjectionFn) {
        self.projections.insert(label.to_string(), projection);
    }

    pub fn projection(&self, label: &str) -> Option<ProjectionFn> {
        self.projections.get(label).copied()
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("labels", &self.schemas.len())
            .finish()
    }
}
