//! Tagged representations of patch/delete tree values.
//!
//! Raw request bodies arrive as `serde_json::Value`. Parsing them into sum
//! types up front means every cardinality branch in the engines is checked
//! exhaustively, and malformed shapes fail with `TypeMismatch` before any
//! mutation happens for that key.

use serde_json::Value;

use crate::store::JsonMap;

use super::errors::MutationError;

/// One value in a patch tree, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    /// Plain scalar: set the attribute (a uuid string against a relation
    /// field means connect-by-reference).
    Scalar(Value),
    /// A map: either an embedded opaque value, or a singleton relation patch.
    Object(JsonMap),
    /// A list of reference/create items, or of scalar strings.
    Items(Vec<PatchItem>),
}

/// One element of a patch list.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchItem {
    /// A bare string: a uuid to connect, or a scalar-list value.
    Text(String),
    /// A map with a `uuid` key: patch the referenced related entity.
    Existing { uuid: String, rest: JsonMap },
    /// A map without a `uuid` key: create a new related entity.
    New(JsonMap),
}

/// One value in a delete tree, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteValue {
    /// Recurse removal into the singleton related entity.
    Object(JsonMap),
    Items(Vec<DeleteItem>),
    /// A scalar leaf. Nothing to remove; tolerated so that identity-only
    /// recursion can carry patch-shaped subtrees.
    Scalar(Value),
}

/// One element of a delete list.
///
/// Note the asymmetry with patching: a map with *only* a uuid means "detach
/// and delete", while extra keys mean "recurse, do not delete". A bare uuid
/// string only detaches.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteItem {
    /// Disconnect the referenced entity (or remove a scalar-list value).
    Text(String),
    /// Detach and delete the referenced entity.
    Delete { uuid: String },
    /// Recurse deletion into the referenced entity's sub-fields.
    Recurse { uuid: String, rest: JsonMap },
}

pub fn parse_patch_value(field: &str, value: Value) -> Result<PatchValue, MutationError> {
    match value {
        Value::Object(map) => Ok(PatchValue::Object(map)),
        Value::Array(raw_items) => {
            let mut items = Vec::with_capacity(raw_items.len());
            for item in raw_items {
                items.push(parse_patch_item(field, item)?);
            }
            Ok(PatchValue::Items(items))
        }
        other => Ok(PatchValue::Scalar(other)),
    }
}

fn parse_patch_item(field: &str, item: Value) -> Result<PatchItem, MutationError> {
    match item {
        Value::String(text) => Ok(PatchItem::Text(text)),
        Value::Object(mut map) => match map.remove("uuid") {
            Some(Value::String(uuid)) => Ok(PatchItem::Existing { uuid, rest: map }),
            Some(other) => Err(MutationError::type_mismatch(
                field,
                format!("expected a uuid string, got {other}"),
            )),
            None => Ok(PatchItem::New(map)),
        },
        _ => Err(MutationError::type_mismatch(
            field,
            "List elements should be either dicts or uuid strings",
        )),
    }
}

pub fn parse_delete_value(field: &str, value: Value) -> Result<DeleteValue, MutationError> {
    match value {
        Value::Object(map) => Ok(DeleteValue::Object(map)),
        Value::Array(raw_items) => {
            let mut items = Vec::with_capacity(raw_items.len());
            for item in raw_items {
                items.push(parse_delete_item(field, item)?);
            }
            Ok(DeleteValue::Items(items))
        }
        other => Ok(DeleteValue::Scalar(other)),
    }
}

fn parse_delete_item(field: &str, item: Value) -> Result<DeleteItem, MutationError> {
    match item {
        Value::String(text) => Ok(DeleteItem::Text(text)),
        Value::Object(mut map) => match map.remove("uuid") {
            Some(Value::String(uuid)) => {
                if map.is_empty() {
                    Ok(DeleteItem::Delete { uuid })
                } else {
                    Ok(DeleteItem::Recurse { uuid, rest: map })
                }
            }
            _ => Err(MutationError::type_mismatch(
                field,
                "Can not identify item without a uuid",
            )),
        },
        _ => Err(MutationError::type_mismatch(
            field,
            "Can only delete from a list of objects or strings",
        )),
    }
}
