use serde_json::json;

use caregraph::clinical::CLINICAL_REGISTRY;
use caregraph::materializer::{materialize, MaterializeError, Projection};

#[test]
fn plain_row_round_trips_by_identity() {
    let raw = json!({"uuid": "n-1", "content": "seen in clinic"});
    let out = materialize(&CLINICAL_REGISTRY, "Note", &raw, Projection::Full).unwrap();
    assert_eq!(out, raw);
}

#[test]
fn compact_patient_projects_the_summary_fields() {
    let raw = json!({
        "patient": {
            "uuid": "p-1",
            "first_name": "Jane",
            "last_name": "Doe",
            "nhs_number": "1111111111",
            "email_address": "jane@example.com"
        },
        "record": [{"uuid": "r-1"}],
        "products": [{"uuid": "prod-1", "product_name": "GDM"}],
        "bookmarked": true
    });
    let out = materialize(&CLINICAL_REGISTRY, "Patient", &raw, Projection::Compact).unwrap();

    assert_eq!(out["first_name"], "Jane");
    assert_eq!(out["uuid"], "p-1");
    assert_eq!(out["record"]["uuid"], "r-1");
    assert_eq!(out["products"][0]["product_name"], "GDM");
    assert_eq!(out["bookmarked"], true);
    // Contact and address details only appear in the full projection.
    assert!(out.get("email_address").is_none());
    assert!(out.get("personal_addresses").is_none());
}

#[test]
fn full_patient_defaults_absent_children() {
    let raw = json!({"patient": {"uuid": "p-1", "first_name": "Jane"}});
    let out = materialize(&CLINICAL_REGISTRY, "Patient", &raw, Projection::Full).unwrap();

    assert_eq!(out["record"], json!(null));
    assert_eq!(out["products"], json!([]));
    assert_eq!(out["bookmarked"], false);
    assert_eq!(out["personal_addresses"], json!([]));
    assert_eq!(out["ethnicity"], json!(null));
}

#[test]
fn nested_composites_materialize_depth_first() {
    let raw = json!({
        "patient": {"uuid": "p-1", "first_name": "Jane"},
        "record": [{
            "record": {"uuid": "r-1"},
            "notes": [{"uuid": "n-1", "content": "seen in clinic"}, null],
            "history": [null]
        }]
    });
    let out = materialize(&CLINICAL_REGISTRY, "Patient", &raw, Projection::Compact).unwrap();

    let record = &out["record"];
    assert_eq!(record["uuid"], "r-1");
    // Null aggregation artifacts are dropped from lists and collapse
    // singletons to null.
    assert_eq!(record["notes"].as_array().unwrap().len(), 1);
    assert_eq!(record["notes"][0]["content"], "seen in clinic");
    assert_eq!(record["history"], json!(null));
}

#[test]
fn dose_projection_includes_its_change_log() {
    let raw = json!({
        "dose": {"uuid": "d-1", "medication_id": "m-123", "dose_amount": 1.5},
        "changes": [{"uuid": "c-1", "dose_amount": 1.5}]
    });
    let out = materialize(&CLINICAL_REGISTRY, "Dose", &raw, Projection::Full).unwrap();
    assert_eq!(out["medication_id"], "m-123");
    assert_eq!(out["changes"][0]["uuid"], "c-1");
}

#[test]
fn non_object_rows_are_rejected() {
    let err = materialize(
        &CLINICAL_REGISTRY,
        "Patient",
        &json!(["not", "a", "row"]),
        Projection::Full,
    )
    .unwrap_err();
    assert!(matches!(err, MaterializeError::NotAnObject { .. }));
}
