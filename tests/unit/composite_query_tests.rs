use caregraph::clinical::CLINICAL_REGISTRY;
use caregraph::composite_query::{compile, QueryPolicy};

#[test]
fn patient_read_query_covers_the_clinical_graph() {
    let query = compile(
        "p",
        "Patient",
        "MATCH (p:Patient) WHERE p.uuid = $uuid",
        &QueryPolicy::standard(),
        &CLINICAL_REGISTRY,
    )
    .unwrap();

    assert!(query.starts_with("MATCH (p:Patient) WHERE p.uuid = $uuid"));
    assert!(query.contains("OPTIONAL MATCH (p)-[:HAS_RECORD]->(record:Record)"));
    assert!(query.contains("OPTIONAL MATCH (record)-[:HAS_DIAGNOSIS]->(diagnoses:Diagnosis)"));
    assert!(query.contains("(management_plan:ManagementPlan)"));
    assert!(query.contains("OPTIONAL MATCH (management_plan)-[:HAS_DOSE]->(doses:Dose)"));
    // One composite per frame, re-bound to the frame variable.
    assert!(query.contains("{ record:record,"));
    assert!(query.lines().last().unwrap().starts_with("RETURN { patient:p,"));
}

#[test]
fn traversal_terminates_across_the_delivery_cycle() {
    // Patient -> Record -> Pregnancy -> Delivery -> Patient revisits the
    // root label; the inner patient is carried as a bound variable only.
    let query = compile(
        "p",
        "Patient",
        "MATCH (p:Patient)",
        &QueryPolicy::standard(),
        &CLINICAL_REGISTRY,
    )
    .unwrap();
    assert_eq!(query.matches("[:HAS_DELIVERY]").count(), 1);
    assert_eq!(query.matches("[:IS_PATIENT]").count(), 1);
    // The revisited Patient frame contributes no second HAS_RECORD match.
    assert_eq!(query.matches("[:HAS_RECORD]").count(), 1);
}

#[test]
fn ignored_label_is_absent_even_when_reachable() {
    let policy = QueryPolicy::standard().ignore("Pregnancy");
    let query = compile(
        "p",
        "Patient",
        "MATCH (p:Patient)",
        &policy,
        &CLINICAL_REGISTRY,
    )
    .unwrap();
    assert!(!query.contains(":Pregnancy"));
    assert!(!query.contains(":Delivery"));
    assert!(query.contains(":Diagnosis"));
}

#[test]
fn default_terminal_labels_stop_at_location() {
    // Location is terminal by default, so a root location query does not
    // follow parent_locations at all.
    let query = compile(
        "l",
        "Location",
        "MATCH (l:Location)",
        &QueryPolicy::standard(),
        &CLINICAL_REGISTRY,
    )
    .unwrap();
    assert_eq!(query, "MATCH (l:Location)\nRETURN l");
}

#[test]
fn override_expression_collapses_to_scalar() {
    let policy = QueryPolicy::standard()
        .override_relation("ACTIVE_ON_PRODUCT", "head(collect({var}.uuid))");
    let query = compile(
        "p",
        "Patient",
        "MATCH (p:Patient)",
        &policy,
        &CLINICAL_REGISTRY,
    )
    .unwrap();
    assert!(query.contains("head(collect(products.uuid)) AS products"));
    assert!(!query.contains("collect(products) AS products"));
}

#[test]
fn unmatched_special_relation_is_silently_ignored() {
    let policy = QueryPolicy::standard().skip_relation("NO_SUCH_RELATION");
    let with_policy = compile(
        "p",
        "Patient",
        "MATCH (p:Patient)",
        &policy,
        &CLINICAL_REGISTRY,
    )
    .unwrap();
    let without = compile(
        "p",
        "Patient",
        "MATCH (p:Patient)",
        &QueryPolicy::standard(),
        &CLINICAL_REGISTRY,
    )
    .unwrap();
    assert_eq!(with_policy, without);
}

#[test]
fn extra_fields_are_carried_into_the_root_composite() {
    let policy = QueryPolicy::standard().extra_field("bookmarked");
    let query = compile(
        "p",
        "Patient",
        "MATCH (p:Patient) WITH p, exists((p)-[:BOOKMARKED_BY]->()) AS bookmarked",
        &policy,
        &CLINICAL_REGISTRY,
    )
    .unwrap();
    assert!(query
        .lines()
        .last()
        .unwrap()
        .contains("bookmarked:bookmarked"));
}
