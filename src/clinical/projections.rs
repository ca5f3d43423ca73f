//! Response shapes and projection functions for the clinical labels.
//!
//! A shape names the composite fields a compiled query produces for the
//! label; a projection renders the final JSON, with already-materialized
//! children passed in as overrides. Labels without a registered projection
//! fall back to the materializer's property/children merge.

use serde_json::Value;

use crate::entity_registry::EntityRegistry;
use crate::materializer::{validate_identity, Projection, ResponseShape};
use crate::store::JsonMap;

pub fn register_shapes(registry: &mut EntityRegistry) {
    registry.register_shape(
        "Patient",
        ResponseShape::new("patient")
            .single("record", "Record")
            .multiple("personal_addresses", "PersonalAddress")
            .multiple("products", "Product")
            .multiple("terms_agreement", "TermsAgreement")
            .custom("bookmarked", validate_identity),
    );
    registry.register_shape(
        "Record",
        ResponseShape::new("record")
            .single("history", "History")
            .multiple("notes", "Note")
            .multiple("diagnoses", "Diagnosis")
            .multiple("pregnancies", "Pregnancy")
            .multiple("visits", "Visit"),
    );
    registry.register_shape(
        "Diagnosis",
        ResponseShape::new("diagnosis")
            .single("management_plan", "ManagementPlan")
            .single("readings_plan", "ReadingsPlan")
            .multiple("observable_entities", "ObservableEntity"),
    );
    registry.register_shape(
        "ManagementPlan",
        ResponseShape::new("management_plan")
            .multiple("doses", "Dose")
            .multiple("actions", "Action")
            .multiple("dose_history", "DoseHistory"),
    );
    registry.register_shape(
        "Dose",
        ResponseShape::new("dose").multiple("changes", "DoseChange"),
    );
    registry.register_shape("DoseChange", ResponseShape::new("dose_change"));
    registry.register_shape(
        "DoseHistory",
        ResponseShape::new("dose_history").single("dose", "Dose"),
    );
    registry.register_shape(
        "ReadingsPlan",
        ResponseShape::new("readings_plan").multiple("changes", "ReadingsPlanChange"),
    );
    registry.register_shape(
        "ReadingsPlanChange",
        ResponseShape::new("readings_plan_change"),
    );
    registry.register_shape(
        "Pregnancy",
        ResponseShape::new("pregnancy").multiple("deliveries", "Delivery"),
    );
    registry.register_shape(
        "Delivery",
        ResponseShape::new("delivery").single("patient", "Patient"),
    );
    registry.register_shape(
        "Visit",
        ResponseShape::new("visit").multiple("diagnoses", "Diagnosis"),
    );
    registry.register_shape(
        "Product",
        ResponseShape::new("product").multiple("changes", "ProductChange"),
    );
    registry.register_shape("ProductChange", ResponseShape::new("product_change"));
    registry.register_shape("PersonalAddress", ResponseShape::new("personal_address"));
    registry.register_shape("TermsAgreement", ResponseShape::new("terms_agreement"));
    registry.register_shape("Note", ResponseShape::new("note"));
    registry.register_shape("History", ResponseShape::new("history"));
    registry.register_shape("ObservableEntity", ResponseShape::new("observable_entity"));
    registry.register_shape("Action", ResponseShape::new("action"));
    registry.register_shape("Clinician", ResponseShape::new("clinician"));
    registry.register_shape("Location", ResponseShape::new("location"));

    registry.register_projection("Patient", patient_projection);
    registry.register_projection("Dose", dose_projection);
}

fn field(props: &JsonMap, name: &str) -> Value {
    props.get(name).cloned().unwrap_or(Value::Null)
}

fn child_or(children: &JsonMap, name: &str, default: Value) -> Value {
    children.get(name).cloned().unwrap_or(default)
}

fn identifier(out: &mut JsonMap, props: &JsonMap) {
    for name in ["uuid", "created", "created_by", "modified", "modified_by"] {
        out.insert(name.to_string(), field(props, name));
    }
}

fn patient_projection(props: &JsonMap, children: &JsonMap, projection: Projection) -> Value {
    let mut out = JsonMap::new();
    for name in [
        "first_name",
        "last_name",
        "dob",
        "nhs_number",
        "hospital_number",
        "sex",
        "locations",
        "fhir_resource_id",
    ] {
        out.insert(name.to_string(), field(props, name));
    }
    out.insert(
        "record".to_string(),
        child_or(children, "record", Value::Null),
    );
    out.insert(
        "products".to_string(),
        child_or(children, "products", Value::Array(Vec::new())),
    );
    out.insert(
        "bookmarked".to_string(),
        child_or(children, "bookmarked", Value::Bool(false)),
    );

    if projection == Projection::Full {
        for name in [
            "phone_number",
            "email_address",
            "allowed_to_text",
            "allowed_to_email",
            "ethnicity",
            "ethnicity_other",
            "height_in_mm",
            "weight_in_g",
            "highest_education_level",
            "highest_education_level_other",
            "accessibility_considerations",
            "accessibility_considerations_other",
            "other_notes",
            "bookmarked_at_locations",
        ] {
            out.insert(name.to_string(), field(props, name));
        }
        out.insert(
            "personal_addresses".to_string(),
            child_or(children, "personal_addresses", Value::Array(Vec::new())),
        );
        out.insert(
            "terms_agreement".to_string(),
            child_or(children, "terms_agreement", Value::Array(Vec::new())),
        );
    }

    identifier(&mut out, props);
    Value::Object(out)
}

fn dose_projection(props: &JsonMap, children: &JsonMap, _projection: Projection) -> Value {
    let mut out = JsonMap::new();
    for name in ["medication_id", "dose_amount", "routine_sct_code"] {
        out.insert(name.to_string(), field(props, name));
    }
    out.insert(
        "changes".to_string(),
        child_or(children, "changes", Value::Array(Vec::new())),
    );
    identifier(&mut out, props);
    Value::Object(out)
}
