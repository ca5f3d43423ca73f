//! Schema error types.
//!
//! Schema errors indicate a malformed or incomplete entity schema declaration.
//! They are programmer errors: the registry is declared statically at startup,
//! so any of these surfacing at runtime means the declaration itself is wrong.
//! Callers are expected to propagate them, never to recover.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("No entity schema declared for label `{label}`")]
    UnknownLabel { label: String },
    #[error(
        "Relation `{relation_type}` on `{label}` targets undeclared label `{target_label}`"
    )]
    UnknownTarget {
        label: String,
        relation_type: String,
        target_label: String,
    },
    #[error("Duplicate schema declaration for label `{label}`")]
    DuplicateLabel { label: String },
}
