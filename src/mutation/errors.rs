//! Error types for the patch/delete engines and the entity store.

use thiserror::Error;

use crate::entity_registry::SchemaError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MutationError {
    /// A uuid reference did not resolve. Surfaced as a client-facing 404.
    #[error("{label} with uuid `{uuid}` not found")]
    NotFound { label: String, uuid: String },

    /// The patch targets a protected field. Client-facing 400.
    #[error("Cannot patch `{field}`")]
    ImmutableField { field: String },

    /// The entity's schema does not declare the attribute.
    #[error("Entity `{label}` does not have attribute: {field}")]
    UnknownAttribute { label: String, field: String },

    /// The tree shape does not match the attribute's cardinality or type.
    /// Client-facing 400.
    #[error("Type mismatch on `{field}`: {message}")]
    TypeMismatch { field: String, message: String },

    /// The field is a relation but is not in the permitted-relation set.
    #[error("`{field}` does not map to a permitted relation")]
    RelationNotPermitted { field: String },

    /// Malformed schema declaration encountered mid-mutation. Fatal.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl MutationError {
    pub fn not_found(label: impl Into<String>, uuid: impl Into<String>) -> Self {
        MutationError::NotFound {
            label: label.into(),
            uuid: uuid.into(),
        }
    }

    pub fn type_mismatch(field: impl Into<String>, message: impl Into<String>) -> Self {
        MutationError::TypeMismatch {
            field: field.into(),
            message: message.into(),
        }
    }
}
