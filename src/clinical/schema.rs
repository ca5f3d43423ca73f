//! Static declaration of the clinical entity graph.
//!
//! One schema per label, declared once at startup. The graph is cyclic by
//! design: Patient -> Record -> Pregnancy -> Delivery -> Patient (a delivery
//! produces a baby who is themselves a patient).

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::entity_registry::{Cardinality, EntityRegistry, EntitySchema, SchemaError};

pub fn declare_schemas(registry: &mut EntityRegistry) -> Result<(), SchemaError> {
    registry.declare(
        EntitySchema::new("Patient")
            .properties(&[
                "first_name",
                "last_name",
                "phone_number",
                "dob",
                "dod",
                "nhs_number",
                "hospital_number",
                "allowed_to_text",
                "allowed_to_email",
                "email_address",
                "ethnicity",
                "ethnicity_other",
                "sex",
                "height_in_mm",
                "weight_in_g",
                "highest_education_level",
                "highest_education_level_other",
                "accessibility_considerations",
                "accessibility_considerations_other",
                "other_notes",
                "locations",
                "bookmarked_at_locations",
                "has_been_bookmarked",
                "fhir_resource_id",
            ])
            .relation("HAS_RECORD", "Record", "record", Cardinality::One)
            .relation(
                "HAS_PERSONAL_ADDRESS",
                "PersonalAddress",
                "personal_addresses",
                Cardinality::ZeroOrMore,
            )
            .relation("ACTIVE_ON_PRODUCT", "Product", "products", Cardinality::ZeroOrMore)
            .relation(
                "HAS_ACCEPTED",
                "TermsAgreement",
                "terms_agreement",
                Cardinality::ZeroOrMore,
            )
            .relation("CHILD_OF", "Patient", "child_of", Cardinality::ZeroOrOne),
    )?;

    registry.declare(
        EntitySchema::new("Record")
            .relation("HAS_NOTE", "Note", "notes", Cardinality::ZeroOrMore)
            .relation("HAS_DIAGNOSIS", "Diagnosis", "diagnoses", Cardinality::ZeroOrMore)
            .relation("HAS_PREGNANCY", "Pregnancy", "pregnancies", Cardinality::ZeroOrMore)
            .relation("HAD_VISIT", "Visit", "visits", Cardinality::ZeroOrMore)
            .relation("HAS_HISTORY", "History", "history", Cardinality::One),
    )?;

    registry.declare(EntitySchema::new("Note").properties(&["content", "clinician_uuid"]))?;
    registry.declare(EntitySchema::new("History").properties(&["parity", "gravidity"]))?;

    registry.declare(
        EntitySchema::new("Diagnosis")
            .properties(&[
                "sct_code",
                "diagnosis_other",
                "diagnosed",
                "resolved",
                "presented",
                "episode",
                "diagnosis_tool",
                "diagnosis_tool_other",
                "risk_factors",
            ])
            .relation(
                "HAS_MANAGEMENT_PLAN",
                "ManagementPlan",
                "management_plan",
                Cardinality::ZeroOrOne,
            )
            .relation(
                "HAS_READINGS_PLAN",
                "ReadingsPlan",
                "readings_plan",
                Cardinality::ZeroOrOne,
            )
            .relation(
                "RELATED_OBSERVATION",
                "ObservableEntity",
                "observable_entities",
                Cardinality::ZeroOrMore,
            ),
    )?;

    registry.declare(
        EntitySchema::new("ManagementPlan")
            .properties(&["sct_code", "start_date", "end_date"])
            .relation("HAS_DOSE", "Dose", "doses", Cardinality::ZeroOrMore)
            .relation("HAS_ACTION", "Action", "actions", Cardinality::ZeroOrMore)
            .relation("HAD_DOSE", "DoseHistory", "dose_history", Cardinality::ZeroOrMore),
    )?;

    registry.declare(
        EntitySchema::new("Dose")
            .properties(&["medication_id", "dose_amount", "routine_sct_code"])
            .relation("HAS_CHANGE", "DoseChange", "changes", Cardinality::ZeroOrMore),
    )?;
    registry.declare(
        EntitySchema::new("DoseChange")
            .properties(&["medication_id", "dose_amount", "routine_sct_code"]),
    )?;
    registry.declare(
        EntitySchema::new("DoseHistory")
            .properties(&["action", "clinician_uuid"])
            .relation("RELATES_TO_DOSE", "Dose", "dose", Cardinality::One),
    )?;

    registry.declare(
        EntitySchema::new("ReadingsPlan")
            .properties(&["sct_code", "days_per_week_to_take_readings", "readings_per_day"])
            .relation(
                "HAS_CHANGE",
                "ReadingsPlanChange",
                "changes",
                Cardinality::ZeroOrMore,
            ),
    )?;
    registry.declare(
        EntitySchema::new("ReadingsPlanChange")
            .properties(&["days_per_week_to_take_readings", "readings_per_day"]),
    )?;

    registry.declare(
        EntitySchema::new("ObservableEntity")
            .properties(&["sct_code", "date_observed", "value_as_string", "metadata"]),
    )?;
    registry.declare(EntitySchema::new("Action").properties(&["action_sct_code"]))?;

    registry.declare(
        EntitySchema::new("Pregnancy")
            .properties(&[
                "estimated_delivery_date",
                "planned_delivery_place",
                "height_at_booking_in_mm",
                "weight_at_booking_in_g",
            ])
            .relation("HAS_DELIVERY", "Delivery", "deliveries", Cardinality::ZeroOrMore),
    )?;
    registry.declare(
        EntitySchema::new("Delivery")
            .properties(&["birth_outcome", "neonatal_complications", "birth_weight_in_grams"])
            .relation("IS_PATIENT", "Patient", "patient", Cardinality::ZeroOrOne),
    )?;

    registry.declare(
        EntitySchema::new("Visit")
            .properties(&["visit_date", "summary", "clinician_uuid", "location"])
            .relation(
                "RELATES_TO_DIAGNOSIS",
                "Diagnosis",
                "diagnoses",
                Cardinality::ZeroOrMore,
            ),
    )?;

    registry.declare(
        EntitySchema::new("PersonalAddress").properties(&[
            "address_line_1",
            "address_line_2",
            "address_line_3",
            "address_line_4",
            "postcode",
            "country",
            "lived_from",
            "lived_until",
        ]),
    )?;

    registry.declare(
        EntitySchema::new("Product")
            .properties(&["product_name", "opened_date", "closed_date", "closed_reason"])
            .relation("HAS_CHANGE", "ProductChange", "changes", Cardinality::ZeroOrMore),
    )?;
    registry.declare(EntitySchema::new("ProductChange").properties(&["event"]))?;

    registry.declare(
        EntitySchema::new("TermsAgreement")
            .properties(&["product_name", "version", "accepted_timestamp"]),
    )?;

    registry.declare(
        EntitySchema::new("Clinician")
            .properties(&["first_name", "last_name", "job_title"])
            .relation("ACTIVE_ON_PRODUCT", "Product", "products", Cardinality::ZeroOrMore),
    )?;

    registry.declare(
        EntitySchema::new("Location")
            .properties(&["location_name", "ods_code", "active"])
            .relation(
                "CHILD_OF_LOCATION",
                "Location",
                "parent_locations",
                Cardinality::ZeroOrMore,
            ),
    )?;

    Ok(())
}

/// Fields that may never be patched, on any label.
pub const IMMUTABLE_FIELDS: [&str; 5] = ["uuid", "created", "modified", "bookmarked", "closed_date"];

/// Relation fields patch/delete trees may connect or create through.
pub const PERMITTED_RELATIONS: [&str; 13] = [
    "notes",
    "diagnoses",
    "deliveries",
    "pregnancies",
    "actions",
    "doses",
    "visits",
    "observable_entities",
    "products",
    "personal_addresses",
    "terms_agreement",
    "parent_locations",
    "child_of",
];

pub fn apply_mutation_policy(registry: &mut EntityRegistry) {
    registry.mark_immutable(&IMMUTABLE_FIELDS);
    registry.permit_relations(&PERMITTED_RELATIONS);
    // A patched parent-location list replaces the existing set.
    registry.mark_overwrite("parent_locations");
    // Visit clinicians are recorded by uuid property, never patched directly.
    registry.mark_skipped("Visit", "clinician");
}

pub fn register_setters(registry: &mut EntityRegistry) {
    for (label, field) in [
        ("Patient", "dob"),
        ("Patient", "dod"),
        ("Diagnosis", "diagnosed"),
        ("Diagnosis", "resolved"),
        ("Diagnosis", "presented"),
        ("PersonalAddress", "lived_from"),
        ("PersonalAddress", "lived_until"),
        ("Pregnancy", "estimated_delivery_date"),
        ("Product", "opened_date"),
        ("Product", "closed_date"),
    ] {
        registry.register_setter(label, field, coerce_iso_date);
    }
    for (label, field) in [
        ("Visit", "visit_date"),
        ("ObservableEntity", "date_observed"),
        ("TermsAgreement", "accepted_timestamp"),
    ] {
        registry.register_setter(label, field, coerce_iso_datetime);
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (date part kept).
fn coerce_iso_date(value: &Value) -> Result<Value, String> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(raw) => {
            if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
                return Ok(Value::String(raw.clone()));
            }
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| Value::String(dt.date_naive().format("%Y-%m-%d").to_string()))
                .map_err(|_| format!("`{raw}` is not an ISO-8601 date"))
        }
        other => Err(format!("expected an ISO-8601 date string, got {other}")),
    }
}

/// Accepts an RFC 3339 timestamp, stored normalized.
fn coerce_iso_datetime(value: &Value) -> Result<Value, String> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Value::String(dt.to_rfc3339()))
            .map_err(|_| format!("`{raw}` is not an ISO-8601 timestamp")),
        other => Err(format!("expected an ISO-8601 timestamp string, got {other}")),
    }
}
