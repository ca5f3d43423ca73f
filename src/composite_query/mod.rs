pub mod builder;
pub mod policy;

pub use builder::compile;
pub use policy::{QueryPolicy, SpecialRelation};
