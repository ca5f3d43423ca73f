//! Composite Cypher query generation.
//!
//! Compiles one query that returns a root entity together with every related
//! entity reachable under the policy, pre-aggregated into a nested map. The
//! caller supplies the leading MATCH fragment (which may bind parameters and
//! extra variables); the builder appends OPTIONAL MATCH / WITH statements per
//! followed relation and a final composite construction per frame.
//!
//! Traversal is depth first over the declared schema. A label is followed at
//! most once per path: on revisit it becomes terminal, which both breaks
//! schema cycles and bounds the emitted query by the number of distinct
//! labels reachable on any path. The same label may still appear several
//! times as a sibling.

use std::collections::HashSet;

use crate::entity_registry::{EntityRegistry, OutgoingRelation, SchemaError};

use super::policy::{QueryPolicy, SpecialRelation};

/// Compile a composite read query rooted at `(root_var:root_label)`.
///
/// `base_fragment` is the caller's leading Cypher (e.g.
/// `MATCH (p:Patient) WHERE p.uuid = $uuid`); it must bind `root_var`. If the
/// fragment already ends in a RETURN, no default return is appended.
///
/// ```
/// use caregraph::composite_query::{compile, QueryPolicy};
/// use caregraph::entity_registry::{Cardinality, EntityRegistry, EntitySchema};
///
/// let mut registry = EntityRegistry::new();
/// registry
///     .declare(EntitySchema::new("Dose").relation(
///         "HAS_CHANGE",
///         "DoseChange",
///         "changes",
///         Cardinality::ZeroOrMore,
///     ))
///     .unwrap();
/// registry.declare(EntitySchema::new("DoseChange")).unwrap();
///
/// let query = compile("d", "Dose", "MATCH (d:Dose)", &QueryPolicy::new(), &registry).unwrap();
/// assert_eq!(
///     query,
///     "MATCH (d:Dose)\n\
///      OPTIONAL MATCH (d)-[:HAS_CHANGE]->(changes:DoseChange)\n\
///      WITH d, collect(changes) AS changes\n\
///      RETURN { dose:d, changes:changes } AS d"
/// );
/// ```
pub fn compile(
    root_var: &str,
    root_label: &str,
    base_fragment: &str,
    policy: &QueryPolicy,
    registry: &EntityRegistry,
) -> Result<String, SchemaError> {
    let mut output: Vec<String> = vec![base_fragment.to_string()];

    build_frame(
        &[root_var.to_string()],
        root_label,
        &mut output,
        &policy.terminal_labels,
        policy,
        registry,
        policy.extra_fields.as_deref(),
    )?;

    let joined = output.join("\n");
    let has_trailing_return = joined
        .lines()
        .last()
        .map(|line| line.trim_start().starts_with("RETURN"))
        .unwrap_or(false);
    if has_trailing_return {
        Ok(joined)
    } else {
        Ok(format!("{joined}\nRETURN {root_var}"))
    }
}

fn follow_relation(relation: &OutgoingRelation, policy: &QueryPolicy) -> bool {
    if policy.ignore_labels.contains(&relation.target_label) {
        return false;
    }
    !matches!(
        policy.special_relations.get(&relation.relation_type),
        Some(SpecialRelation::Skip)
    )
}

/// Emit the statements for one traversal frame.
///
/// `names` is the enclosing scope: every variable that must be carried through
/// each WITH, with the frame's own variable last. `visited` holds the labels
/// already followed on this path plus the policy's terminal labels.
fn build_frame(
    names: &[String],
    label: &str,
    output: &mut Vec<String>,
    visited: &HashSet<String>,
    policy: &QueryPolicy,
    registry: &EntityRegistry,
    extra_fields: Option<&[String]>,
) -> Result<(), SchemaError> {
    let candidates = registry.resolve(label)?;
    let mut relations: Vec<&OutgoingRelation> = candidates
        .iter()
        .filter(|rel| follow_relation(rel, policy))
        .collect();

    if visited.contains(label) || relations.is_empty() {
        if extra_fields.is_none() {
            // Nothing to aggregate; the parent already holds this node by
            // its bound variable.
            return Ok(());
        }
        // Terminal at the root, but the caller still wants its extra fields
        // wrapped into a composite.
        relations.clear();
    }

    // Once a label has been handled, any further occurrence on this path is
    // terminal. e.g. Patient -> ... -> Delivery -> Patient.
    let mut visited = visited.clone();
    visited.insert(label.to_string());

    let out_var = names.last().expect("frame always has a variable");
    let mut local_names: Vec<String> = names.to_vec();

    let mut collect: Vec<String> = Vec::new();
    if let Some(extra) = extra_fields {
        collect.extend(extra.iter().map(|field| format!("{field}:{field}")));
        local_names.extend(extra.iter().cloned());
    }

    for relation in relations {
        let var = unique_name(&relation.field_name, &local_names);
        output.push(format!(
            "OPTIONAL MATCH ({out_var})-[:{}]->({var}:{})",
            relation.relation_type, relation.target_label
        ));

        let mut child_names = local_names.clone();
        child_names.push(var.clone());
        build_frame(
            &child_names,
            &relation.target_label,
            output,
            &visited,
            policy,
            registry,
            None,
        )?;

        let aggregate = match policy.special_relations.get(&relation.relation_type) {
            Some(SpecialRelation::Override(expr)) => expr.replace("{var}", &var),
            _ => format!("collect({var})"),
        };
        output.push(format!(
            "WITH {}, {aggregate} AS {var}",
            local_names.join(", ")
        ));
        local_names.push(var.clone());
        collect.push(format!("{}:{var}", relation.field_name));
    }

    // Collapse the frame into one composite map, re-bound to the frame's own
    // variable so the parent treats the whole subtree as a single value.
    let mut fields = vec![format!("{}:{out_var}", camel_to_snake(label))];
    fields.extend(collect);
    let composite = fields.join(", ");

    if names.len() > 1 {
        let rebound = format!(
            "CASE WHEN {out_var} IS NOT NULL THEN {{ {composite} }} END AS {out_var}"
        );
        let mut scope: Vec<String> = names[..names.len() - 1].to_vec();
        scope.push(rebound);
        output.push(format!("WITH {}", scope.join(", ")));
    } else {
        output.push(format!("RETURN {{ {composite} }} AS {out_var}"));
    }
    Ok(())
}

/// Allocate an alias that does not collide with anything in scope.
/// Collisions take a numeric suffix: `changes`, `changes_1`, `changes_2`.
fn unique_name(field_name: &str, scope: &[String]) -> String {
    if !scope.iter().any(|n| n == field_name) {
        return field_name.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{field_name}_{counter}");
        if !scope.iter().any(|n| n == &candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// `ManagementPlan` -> `management_plan`. An underscore goes before each
/// capital run; a run opening the name keeps its first letter attached, so
/// `ABCDef` -> `a_bcdef`.
pub(crate) fn camel_to_snake(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    let mut prev_upper = false;
    for (i, ch) in camel.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && (!prev_upper || i == 1) {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_upper = true;
        } else {
            out.push(ch);
            prev_upper = false;
        }
    }
    out
}
