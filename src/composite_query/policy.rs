//! Traversal policy for composite query generation.

use std::collections::{HashMap, HashSet};

use crate::config;

/// Per-relation-type override applied while compiling a composite query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialRelation {
    /// The relation is not followed and contributes nothing.
    Skip,
    /// Aggregate with this Cypher expression instead of `collect({var})`.
    /// The bound child variable may be referenced as `{var}`.
    Override(String),
}

/// Controls which parts of the schema graph a compiled query follows.
///
/// Relation types named in `special_relations` but never visited are silently
/// unmatched; the policy is permissive by design.
#[derive(Debug, Clone, Default)]
pub struct QueryPolicy {
    /// Traversal does not follow outgoing relations from these labels.
    pub terminal_labels: HashSet<String>,
    /// These labels, and any relation leading to them, are ignored entirely.
    pub ignore_labels: HashSet<String>,
    pub special_relations: HashMap<String, SpecialRelation>,
    /// Extra variables bound by the base fragment to carry into the root
    /// composite (e.g. a `bookmarked` flag computed by the caller).
    pub extra_fields: Option<Vec<String>>,
}

impl QueryPolicy {
    /// Empty policy: follow everything, no extra fields.
    pub fn new() -> Self {
        QueryPolicy::default()
    }

    /// The standard read policy: stop at the configured terminal labels
    /// (Clinician and Location unless overridden by the environment).
    pub fn standard() -> Self {
        QueryPolicy {
            terminal_labels: config::default_terminal_labels().iter().cloned().collect(),
            ..QueryPolicy::default()
        }
    }

    pub fn terminal(mut self, label: &str) -> Self {
        self.terminal_labels.insert(label.to_string());
        self
    }

    pub fn ignore(mut self, label: &str) -> Self {
        self.ignore_labels.insert(label.to_string());
        self
    }

    pub fn skip_relation(mut self, relation_type: &str) -> Self {
        self.special_relations
            .insert(relation_type.to_string(), SpecialRelation::Skip);
        self
    }

    pub fn override_relation(mut self, relation_type: &str, expr: &str) -> Self {
        self.special_relations.insert(
            relation_type.to_string(),
            SpecialRelation::Override(expr.to_string()),
        );
        self
    }

    pub fn extra_field(mut self, name: &str) -> Self {
        self.extra_fields
            .get_or_insert_with(Vec::new)
            .push(name.to_string());
        self
    }
}
