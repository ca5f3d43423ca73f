//! Static per-label entity schema declarations.

use serde::{Deserialize, Serialize};

/// How many targets an outgoing relation may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    ZeroOrOne,
    ZeroOrMore,
}

impl Cardinality {
    /// Singleton relations hold at most one target; connecting replaces.
    pub fn is_singleton(&self) -> bool {
        matches!(self, Cardinality::One | Cardinality::ZeroOrOne)
    }
}

/// A typed, directed edge from one entity label to another, exposed on the
/// owning side under `field_name`. Only the owning (outgoing) side is ever
/// enumerated; incoming relations are not part of a label's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingRelation {
    pub relation_type: String,
    pub target_label: String,
    pub field_name: String,
    pub cardinality: Cardinality,
}

impl OutgoingRelation {
    pub fn new(
        relation_type: impl Into<String>,
        target_label: impl Into<String>,
        field_name: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        OutgoingRelation {
            relation_type: relation_type.into(),
            target_label: target_label.into(),
            field_name: field_name.into(),
            cardinality,
        }
    }
}

/// Static definition of one entity type: its label, the scalar properties it
/// may carry, and its outgoing relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    pub label: String,
    pub properties: Vec<String>,
    pub relations: Vec<OutgoingRelation>,
}

impl EntitySchema {
    pub fn new(label: impl Into<String>) -> Self {
        EntitySchema {
            label: label.into(),
            properties: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.properties.push(name.into());
        self
    }

    pub fn properties(mut self, names: &[&str]) -> Self {
        self.properties.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn relation(
        mut self,
        relation_type: &str,
        target_label: &str,
        field_name: &str,
        cardinality: Cardinality,
    ) -> Self {
        self.relations.push(OutgoingRelation::new(
            relation_type,
            target_label,
            field_name,
            cardinality,
        ));
        self
    }

    /// Look up an outgoing relation by the field it is exposed under.
    pub fn relation_by_field(&self, field_name: &str) -> Option<&OutgoingRelation> {
        self.relations.iter().find(|r| r.field_name == field_name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }
}
