//! The clinical domain: schema, hooks, shapes and projections for the
//! patient record graph.

pub mod hooks;
pub mod projections;
pub mod schema;

use std::sync::Arc;

use lazy_static::lazy_static;

use crate::entity_registry::{EntityRegistry, SchemaError};

use hooks::{DoseHooks, PatientHooks};

/// Build a fully configured clinical registry.
pub fn build_registry() -> Result<EntityRegistry, SchemaError> {
    let mut registry = EntityRegistry::new();
    schema::declare_schemas(&mut registry)?;
    schema::apply_mutation_policy(&mut registry);
    schema::register_setters(&mut registry);
    projections::register_shapes(&mut registry);
    registry.register_hooks("Patient", Arc::new(PatientHooks));
    registry.register_hooks("Dose", Arc::new(DoseHooks));
    Ok(registry)
}

lazy_static! {
    /// The process-wide clinical registry. The schema is static, so one
    /// registry serves every request for the process lifetime.
    pub static ref CLINICAL_REGISTRY: Arc<EntityRegistry> =
        Arc::new(build_registry().expect("clinical schema is statically declared"));
}
