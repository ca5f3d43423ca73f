//! Result materialization.
//!
//! Converts one raw driver row into a serialized entity tree. A row is
//! either a plain node (no aggregation happened) or a nested composite as
//! produced by a compiled composite query: a map holding the root node under
//! its primary key plus one entry per aggregated relation.
//!
//! Each label registers a `ResponseShape` describing which composite fields
//! to materialize and how, and a projection function rendering the final
//! JSON (compact or full). Children are materialized first and passed to the
//! projection as overrides, so no further queries are ever issued.

use serde_json::Value;
use thiserror::Error;

use crate::entity_registry::{EntityRegistry, SchemaError};
use crate::store::JsonMap;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MaterializeError {
    #[error("Expected an object row for `{label}`, got {snippet}")]
    NotAnObject { label: String, snippet: String },
    #[error("Type mismatch on `{field}`: {message}")]
    TypeMismatch { field: String, message: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl MaterializeError {
    fn type_mismatch(field: impl Into<String>, message: impl Into<String>) -> Self {
        MaterializeError::TypeMismatch {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validates/coerces a custom composite field (one not backed by a node).
pub type ValidatorFn = fn(&Value) -> Result<Value, MaterializeError>;

/// Renders the final JSON for one label from its inflated properties and
/// already-materialized children.
pub type ProjectionFn = fn(&JsonMap, &JsonMap, Projection) -> Value;

/// Which projection method to dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Full,
    Compact,
}

/// Declares how composite rows for one label are shaped.
#[derive(Debug, Clone)]
pub struct ResponseShape {
    /// The composite key holding the root node (the lowercased entity name).
    pub primary: String,
    /// Singleton children: first element of the aggregated list, or null.
    pub single: Vec<(String, String)>,
    /// Multi-valued children: every element is materialized.
    pub multiple: Vec<(String, String)>,
    /// Custom fields handled by a validator instead of node inflation.
    pub custom: Vec<(String, ValidatorFn)>,
}

impl ResponseShape {
    pub fn new(primary: &str) -> Self {
        ResponseShape {
            primary: primary.to_string(),
            single: Vec::new(),
            multiple: Vec::new(),
            custom: Vec::new(),
        }
    }

    pub fn single(mut self, field: &str, label: &str) -> Self {
        self.single.push((field.to_string(), label.to_string()));
        self
    }

    pub fn multiple(mut self, field: &str, label: &str) -> Self {
        self.multiple.push((field.to_string(), label.to_string()));
        self
    }

    pub fn custom(mut self, field: &str, validator: ValidatorFn) -> Self {
        self.custom.push((field.to_string(), validator));
        self
    }
}

/// Materialize one raw row for `label`.
///
/// A composite row (an object containing the shape's primary key) has its
/// declared children materialized recursively; anything else is treated as a
/// plain root row and inflated by identity. Shape-hinted fields absent from
/// the row default rather than erroring.
pub fn materialize(
    registry: &EntityRegistry,
    label: &str,
    raw: &Value,
    projection: Projection,
) -> Result<Value, MaterializeError> {
    let object = match raw {
        Value::Object(map) => map,
        other => {
            return Err(MaterializeError::NotAnObject {
                label: label.to_string(),
                snippet: snippet(other),
            })
        }
    };

    let shape = registry.shape(label);
    let is_composite = shape
        .map(|s| object.contains_key(&s.primary))
        .unwrap_or(false);

    let (props, children) = if is_composite {
        let shape = shape.expect("composite implies shape");
        let props = match object.get(&shape.primary) {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(MaterializeError::type_mismatch(
                    &shape.primary,
                    format!("expected the root node object, got {}", snippet(other)),
                ))
            }
            None => unreachable!("checked above"),
        };

        let mut children = JsonMap::new();
        for (field, child_label) in &shape.single {
            if let Some(value) = object.get(field) {
                children.insert(field.clone(), materialize_single(
                    registry,
                    child_label,
                    field,
                    value,
                    projection,
                )?);
            }
        }
        for (field, child_label) in &shape.multiple {
            if let Some(value) = object.get(field) {
                children.insert(
                    field.clone(),
                    materialize_multiple(registry, child_label, field, value, projection)?,
                );
            }
        }
        for (field, validator) in &shape.custom {
            if let Some(value) = object.get(field) {
                children.insert(field.clone(), validator(value)?);
            }
        }
        (props, children)
    } else {
        // Plain root row: inflate by identity, no children.
        (object.clone(), JsonMap::new())
    };

    let project = registry.projection(label).unwrap_or(default_projection);
    Ok(project(&props, &children, projection))
}

/// First element or null: singleton relations are aggregated as lists by the
/// query compiler.
fn materialize_single(
    registry: &EntityRegistry,
    child_label: &str,
    field: &str,
    value: &Value,
    projection: Projection,
) -> Result<Value, MaterializeError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(elements) => match elements.first() {
            Some(Value::Null) | None => Ok(Value::Null),
            Some(first) => materialize(registry, child_label, first, projection),
        },
        // An override expression may have collapsed the list already.
        other => materialize(registry, child_label, other, projection),
    }
    .map_err(|e| nested_error(field, e))
}

fn materialize_multiple(
    registry: &EntityRegistry,
    child_label: &str,
    field: &str,
    value: &Value,
    projection: Projection,
) -> Result<Value, MaterializeError> {
    let elements = match value {
        Value::Array(elements) => elements,
        Value::Null => return Ok(Value::Array(Vec::new())),
        other => {
            return Err(MaterializeError::type_mismatch(
                field,
                format!("expected an aggregated list, got {}", snippet(other)),
            ))
        }
    };
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        if element.is_null() {
            continue;
        }
        out.push(
            materialize(registry, child_label, element, projection)
                .map_err(|e| nested_error(field, e))?,
        );
    }
    Ok(Value::Array(out))
}

fn nested_error(field: &str, err: MaterializeError) -> MaterializeError {
    match err {
        MaterializeError::NotAnObject { label, snippet } => MaterializeError::type_mismatch(
            field,
            format!("child `{label}` is not an object: {snippet}"),
        ),
        other => other,
    }
}

/// Fallback projection: node properties with materialized children merged
/// over them.
fn default_projection(props: &JsonMap, children: &JsonMap, _projection: Projection) -> Value {
    let mut out = props.clone();
    for (field, value) in children {
        out.insert(field.clone(), value.clone());
    }
    Value::Object(out)
}

// ---- stock validators ----

pub fn validate_uuid_list(value: &Value) -> Result<Value, MaterializeError> {
    match value {
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(value.clone()),
        _ => Err(MaterializeError::type_mismatch(
            "uuids",
            "Expected list of uuids",
        )),
    }
}

pub fn validate_single_uuid(value: &Value) -> Result<Value, MaterializeError> {
    match value {
        Value::String(_) => Ok(value.clone()),
        _ => Err(MaterializeError::type_mismatch(
            "uuid",
            "Expecting single uuid",
        )),
    }
}

/// Identity validator: passes the value straight through.
pub fn validate_identity(value: &Value) -> Result<Value, MaterializeError> {
    Ok(value.clone())
}

fn snippet(value: &Value) -> String {
    let mut rendered = value.to_string();
    // Truncate on a char boundary; rows carry non-ASCII clinical text.
    match rendered.char_indices().nth(60) {
        Some((cut, _)) => {
            rendered.truncate(cut);
            format!("{rendered}...")
        }
        None => rendered,
    }
}
