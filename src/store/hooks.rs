//! Entity lifecycle hooks.
//!
//! Domain types customize the generic engines through this capability
//! interface; every method has a no-op default. Hooks are registered per
//! label on the registry and invoked explicitly by the patch/delete engines.

use super::arena::EntityStore;
use super::entity::{EntityId, JsonMap};
use crate::mutation::errors::MutationError;

pub trait EntityHooks: Send + Sync {
    /// Runs before any key of a patch tree is applied. May rewrite or strip
    /// the tree (e.g. clear a dependent free-text field when its governing
    /// coded field changes away from an "other" sentinel).
    fn on_pre_patch(
        &self,
        _store: &mut EntityStore,
        _id: EntityId,
        _tree: &mut JsonMap,
    ) -> Result<(), MutationError> {
        Ok(())
    }

    /// Runs after a new related entity has been persisted and connected.
    fn on_create(&self, _store: &mut EntityStore, _id: EntityId) -> Result<(), MutationError> {
        Ok(())
    }

    /// Runs before a bare-uuid delete-tree item detaches and deletes the
    /// entity. Returning `false` vetoes the deletion; nothing is detached
    /// and no error is raised.
    fn on_pre_delete(
        &self,
        _store: &mut EntityStore,
        _id: EntityId,
    ) -> Result<bool, MutationError> {
        Ok(true)
    }
}

/// The default hook set: every method a no-op.
pub struct NoHooks;

impl EntityHooks for NoHooks {}
