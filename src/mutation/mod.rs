pub mod delete;
pub mod errors;
pub mod patch;
pub mod tree;

pub use delete::recursive_delete;
pub use errors::MutationError;
pub use patch::recursive_patch;
pub use tree::{DeleteItem, DeleteValue, PatchItem, PatchValue};
