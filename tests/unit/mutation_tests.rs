use serde_json::{json, Value};

use caregraph::clinical::CLINICAL_REGISTRY;
use caregraph::mutation::{recursive_delete, recursive_patch, MutationError};
use caregraph::store::{EntityId, EntityStore, JsonMap};

fn store() -> EntityStore {
    super::init_logging();
    EntityStore::new(CLINICAL_REGISTRY.clone())
}

fn tree(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture tree must be an object, got {other}"),
    }
}

fn patient_with_record(store: &mut EntityStore) -> (EntityId, EntityId) {
    let patient = store.create("Patient", JsonMap::new()).unwrap();
    let record = store.create("Record", JsonMap::new()).unwrap();
    store.connect(patient, "record", record).unwrap();
    (patient, record)
}

#[test]
fn empty_patch_touches_only_modification_metadata() {
    let mut store = store();
    let plan = store
        .create("ManagementPlan", tree(json!({"sct_code": "D0000007"})))
        .unwrap();
    let before_props = store.entity(plan).properties.clone();
    let before_modified = store.entity(plan).modified;

    recursive_patch(&mut store, plan, JsonMap::new()).unwrap();

    assert_eq!(store.entity(plan).properties, before_props);
    assert!(store.entity(plan).modified >= before_modified);
    assert_eq!(store.journal(), &[plan]);
}

#[test]
fn scalar_patch_applies_registered_setters() {
    let mut store = store();
    let patient = store.create("Patient", JsonMap::new()).unwrap();
    recursive_patch(
        &mut store,
        patient,
        tree(json!({"first_name": "Jane", "dob": "1990-02-01T10:00:00+00:00"})),
    )
    .unwrap();
    let entity = store.entity(patient);
    assert_eq!(entity.property("first_name"), Some(&json!("Jane")));
    assert_eq!(entity.property("dob"), Some(&json!("1990-02-01")));
}

#[test]
fn immutable_field_aborts_without_a_write() {
    let mut store = store();
    let plan = store.create("ManagementPlan", JsonMap::new()).unwrap();
    let err = recursive_patch(&mut store, plan, tree(json!({"uuid": "forged"}))).unwrap_err();
    assert!(matches!(err, MutationError::ImmutableField { field } if field == "uuid"));
    assert!(store.journal().is_empty());
}

#[test]
fn unknown_attribute_is_rejected() {
    let mut store = store();
    let plan = store.create("ManagementPlan", JsonMap::new()).unwrap();
    let err = recursive_patch(&mut store, plan, tree(json!({"bogus": 1}))).unwrap_err();
    assert!(matches!(
        err,
        MutationError::UnknownAttribute { label, field }
            if label == "ManagementPlan" && field == "bogus"
    ));
}

#[test]
fn skipped_field_is_silently_dropped() {
    let mut store = store();
    let visit = store.create("Visit", JsonMap::new()).unwrap();
    recursive_patch(
        &mut store,
        visit,
        tree(json!({"clinician": "c-1", "summary": "routine"})),
    )
    .unwrap();
    let entity = store.entity(visit);
    assert_eq!(entity.property("summary"), Some(&json!("routine")));
    assert_eq!(entity.property("clinician"), None);
}

#[test]
fn uuid_list_connect_is_idempotent() {
    let mut store = store();
    let patient = store.create("Patient", JsonMap::new()).unwrap();
    let product = store
        .create("Product", tree(json!({"product_name": "GDM"})))
        .unwrap();
    let product_uuid = store.entity(product).uuid.clone();

    let payload = tree(json!({"products": [product_uuid]}));
    recursive_patch(&mut store, patient, payload.clone()).unwrap();
    recursive_patch(&mut store, patient, payload).unwrap();

    assert_eq!(store.entity(patient).targets("products"), &[product]);
}

#[test]
fn connect_through_unlisted_relation_is_rejected() {
    let mut store = store();
    let (patient, record) = patient_with_record(&mut store);
    let record_uuid = store.entity(record).uuid.clone();
    let err =
        recursive_patch(&mut store, patient, tree(json!({"record": record_uuid}))).unwrap_err();
    assert!(matches!(
        err,
        MutationError::RelationNotPermitted { field } if field == "record"
    ));
}

#[test]
fn unresolvable_reference_is_not_found() {
    let mut store = store();
    let patient = store.create("Patient", JsonMap::new()).unwrap();
    let err = recursive_patch(&mut store, patient, tree(json!({"products": ["missing"]})))
        .unwrap_err();
    assert!(matches!(
        err,
        MutationError::NotFound { label, uuid } if label == "Product" && uuid == "missing"
    ));
}

#[test]
fn overwrite_relation_syncs_to_the_payload() {
    let mut store = store();
    let ward = store.create("Location", JsonMap::new()).unwrap();
    let hospital = store.create("Location", JsonMap::new()).unwrap();
    let trust = store.create("Location", JsonMap::new()).unwrap();
    store.connect(ward, "parent_locations", hospital).unwrap();
    store.connect(ward, "parent_locations", trust).unwrap();

    let hospital_uuid = store.entity(hospital).uuid.clone();
    recursive_patch(
        &mut store,
        ward,
        tree(json!({"parent_locations": [hospital_uuid]})),
    )
    .unwrap();

    assert_eq!(store.entity(ward).targets("parent_locations"), &[hospital]);
}

#[test]
fn singleton_map_without_uuid_recurses_into_current_target() {
    let mut store = store();
    let (patient, record) = patient_with_record(&mut store);

    recursive_patch(
        &mut store,
        patient,
        tree(json!({"record": {"notes": [{"content": "first contact"}]}})),
    )
    .unwrap();

    let notes = store.entity(record).targets("notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(
        store.entity(notes[0]).property("content"),
        Some(&json!("first contact"))
    );
    assert!(store.journal().contains(&notes[0]));
}

#[test]
fn singleton_map_with_uuid_replaces_and_patches() {
    let mut store = store();
    let patient = store.create("Patient", JsonMap::new()).unwrap();
    let baby = store.create("Patient", JsonMap::new()).unwrap();
    let baby_uuid = store.entity(baby).uuid.clone();

    recursive_patch(
        &mut store,
        patient,
        tree(json!({"child_of": {"uuid": baby_uuid, "first_name": "Sam"}})),
    )
    .unwrap();

    assert_eq!(store.entity(patient).targets("child_of"), &[baby]);
    assert_eq!(store.entity(baby).property("first_name"), Some(&json!("Sam")));
}

#[test]
fn new_dose_records_change_and_insert_history() {
    let mut store = store();
    let plan = store.create("ManagementPlan", JsonMap::new()).unwrap();

    recursive_patch(
        &mut store,
        plan,
        tree(json!({"doses": [{"medication_id": "m-123", "dose_amount": 1.5}]})),
    )
    .unwrap();

    let doses = store.entity(plan).targets("doses").to_vec();
    assert_eq!(doses.len(), 1);
    let dose = doses[0];
    assert_eq!(
        store.entity(dose).property("medication_id"),
        Some(&json!("m-123"))
    );

    // Creation snapshots the dose into one DoseChange.
    let changes = store.entity(dose).targets("changes");
    assert_eq!(changes.len(), 1);
    assert_eq!(
        store.entity(changes[0]).property("dose_amount"),
        Some(&json!(1.5))
    );

    // And the owning plan gets one "insert" history entry pointing at it.
    let history = store.entity(plan).targets("dose_history").to_vec();
    assert_eq!(history.len(), 1);
    assert_eq!(
        store.entity(history[0]).property("action"),
        Some(&json!("insert"))
    );
    assert_eq!(store.entity(history[0]).targets("dose"), &[dose]);
}

#[test]
fn dose_patch_snapshots_changed_fields() {
    let mut store = store();
    let plan = store.create("ManagementPlan", JsonMap::new()).unwrap();
    let dose = store
        .create("Dose", tree(json!({"medication_id": "m-123"})))
        .unwrap();
    store.connect(plan, "doses", dose).unwrap();

    recursive_patch(&mut store, dose, tree(json!({"dose_amount": 2.0}))).unwrap();

    assert_eq!(store.entity(dose).property("dose_amount"), Some(&json!(2.0)));
    let changes = store.entity(dose).targets("changes");
    assert_eq!(changes.len(), 1);
    let change = store.entity(changes[0]);
    assert_eq!(change.property("dose_amount"), Some(&json!(2.0)));
    assert_eq!(change.property("medication_id"), None);
}

#[test]
fn ethnicity_sentinel_governs_its_free_text_companion() {
    let mut store = store();
    let patient = store.create("Patient", JsonMap::new()).unwrap();

    recursive_patch(
        &mut store,
        patient,
        tree(json!({"ethnicity": "186023009", "ethnicity_other": "Cornish"})),
    )
    .unwrap();
    assert_eq!(
        store.entity(patient).property("ethnicity_other"),
        Some(&json!("Cornish"))
    );

    // Moving off the sentinel clears the free text, even unmentioned.
    recursive_patch(&mut store, patient, tree(json!({"ethnicity": "494161000"}))).unwrap();
    assert_eq!(
        store.entity(patient).property("ethnicity_other"),
        Some(&Value::Null)
    );
}

#[test]
fn scalar_list_patch_appends_without_duplicates() {
    let mut store = store();
    let patient = store.create("Patient", JsonMap::new()).unwrap();
    recursive_patch(&mut store, patient, tree(json!({"locations": ["L1", "L2"]}))).unwrap();
    recursive_patch(&mut store, patient, tree(json!({"locations": ["L2", "L3"]}))).unwrap();
    assert_eq!(
        store.entity(patient).property("locations"),
        Some(&json!(["L1", "L2", "L3"]))
    );
}

#[test]
fn scalar_list_delete_removes_matching_values() {
    let mut store = store();
    let patient = store.create("Patient", JsonMap::new()).unwrap();
    recursive_patch(&mut store, patient, tree(json!({"locations": ["L1", "L2", "L3"]})))
        .unwrap();
    recursive_delete(&mut store, patient, tree(json!({"locations": ["L2"]}))).unwrap();
    assert_eq!(
        store.entity(patient).property("locations"),
        Some(&json!(["L1", "L3"]))
    );
}

#[test]
fn bare_uuid_item_detaches_and_deletes() {
    let mut store = store();
    let (_, record) = patient_with_record(&mut store);
    recursive_patch(
        &mut store,
        record,
        tree(json!({"notes": [{"content": "a"}, {"content": "b"}]})),
    )
    .unwrap();
    let notes = store.entity(record).targets("notes").to_vec();
    let doomed_uuid = store.entity(notes[0]).uuid.clone();

    recursive_delete(&mut store, record, tree(json!({"notes": [{"uuid": doomed_uuid}]})))
        .unwrap();

    assert!(store.get(notes[0]).is_none());
    assert_eq!(store.entity(record).targets("notes"), &[notes[1]]);
}

#[test]
fn extra_keys_recurse_instead_of_deleting() {
    let mut store = store();
    let (_, record) = patient_with_record(&mut store);
    recursive_patch(&mut store, record, tree(json!({"notes": [{"content": "keep me"}]})))
        .unwrap();
    let note = store.entity(record).targets("notes")[0];
    let note_uuid = store.entity(note).uuid.clone();

    recursive_delete(
        &mut store,
        record,
        tree(json!({"notes": [{"uuid": note_uuid, "content": "keep me"}]})),
    )
    .unwrap();

    assert!(store.get(note).is_some());
    assert_eq!(store.entity(record).targets("notes"), &[note]);
    assert_eq!(store.entity(note).property("content"), Some(&json!("keep me")));
}

#[test]
fn bare_string_item_only_detaches() {
    let mut store = store();
    let (_, record) = patient_with_record(&mut store);
    recursive_patch(&mut store, record, tree(json!({"notes": [{"content": "a"}]}))).unwrap();
    let note = store.entity(record).targets("notes")[0];
    let note_uuid = store.entity(note).uuid.clone();

    recursive_delete(&mut store, record, tree(json!({"notes": [note_uuid]}))).unwrap();
    assert!(store.get(note).is_some());
    assert!(store.entity(record).targets("notes").is_empty());

    // An unresolvable uuid string is silently skipped.
    recursive_delete(&mut store, record, tree(json!({"notes": ["no-such-note"]}))).unwrap();
}

#[test]
fn unresolved_delete_target_is_not_found() {
    let mut store = store();
    let (_, record) = patient_with_record(&mut store);
    let err = recursive_delete(&mut store, record, tree(json!({"notes": [{"uuid": "missing"}]})))
        .unwrap_err();
    assert!(matches!(err, MutationError::NotFound { .. }));
}

#[test]
fn singleton_delete_recurses_through_the_relation() {
    let mut store = store();
    let (patient, record) = patient_with_record(&mut store);
    recursive_patch(&mut store, record, tree(json!({"notes": [{"content": "a"}]}))).unwrap();
    let note = store.entity(record).targets("notes")[0];
    let note_uuid = store.entity(note).uuid.clone();

    recursive_delete(
        &mut store,
        patient,
        tree(json!({"record": {"notes": [note_uuid]}})),
    )
    .unwrap();
    assert!(store.entity(record).targets("notes").is_empty());
}

#[test]
fn dose_deletion_is_vetoed_into_a_detach() {
    let mut store = store();
    let plan = store.create("ManagementPlan", JsonMap::new()).unwrap();
    recursive_patch(
        &mut store,
        plan,
        tree(json!({"doses": [{"medication_id": "m-123", "dose_amount": 1.5}]})),
    )
    .unwrap();
    let dose = store.entity(plan).targets("doses")[0];
    let dose_uuid = store.entity(dose).uuid.clone();

    recursive_delete(&mut store, plan, tree(json!({"doses": [{"uuid": dose_uuid}]}))).unwrap();

    // The dose survives, detached; history now shows insert and delete.
    assert!(store.get(dose).is_some());
    assert!(store.entity(plan).targets("doses").is_empty());
    let actions: Vec<Value> = store
        .entity(plan)
        .targets("dose_history")
        .iter()
        .map(|entry| store.entity(*entry).property("action").cloned().unwrap())
        .collect();
    assert_eq!(actions, vec![json!("insert"), json!("delete")]);
}

#[test]
fn error_mid_tree_leaves_earlier_writes_journaled() {
    let mut store = store();
    let (_, record) = patient_with_record(&mut store);

    let err = recursive_patch(
        &mut store,
        record,
        tree(json!({"notes": [{"content": "kept"}], "bogus": 1})),
    )
    .unwrap_err();
    assert!(matches!(err, MutationError::UnknownAttribute { .. }));

    // The note created before the failing key was already persisted.
    let notes = store.entity(record).targets("notes");
    assert_eq!(notes.len(), 1);
    assert!(store.journal().contains(&notes[0]));
    assert!(!store.journal().contains(&record));
}
