pub mod errors;
pub mod registry;
pub mod schema;

pub use errors::SchemaError;
pub use registry::{EntityRegistry, SetterFn};
pub use schema::{Cardinality, EntitySchema, OutgoingRelation};
