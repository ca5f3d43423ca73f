pub mod arena;
pub mod entity;
pub mod hooks;

pub use arena::EntityStore;
pub use entity::{Entity, EntityId, JsonMap, RelationSlot};
pub use hooks::{EntityHooks, NoHooks};
