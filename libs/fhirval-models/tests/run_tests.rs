use fhirval_models::common::{
    CodeSystem, CodeSystemContentMode, ConstraintSeverity, ElementDefinitionConstraint, PublicationStatus, ValueSet,
};
use serde_json::json;

#[test]
fn parse_value_set_with_enumerated_compose() {
    let vs: ValueSet = serde_json::from_value(json!({
        "resourceType": "ValueSet",
        "url": "http://hl7.org/fhir/ValueSet/example-extensional",
        "status": "active",
        "compose": {
            "include": [{
                "system": "http://hl7.org/fhir/administrative-gender",
                "concept": [
                    {"code": "male", "display": "Male"},
                    {"code": "female", "display": "Female"},
                    {"code": "other", "display": "Other"},
                    {"code": "unknown", "display": "Unknown"}
                ]
            }]
        },
        "meta": {"versionId": "1"},
        "text": {"status": "generated", "div": "<div/>"}
    }))
    .expect("value set should deserialize");

    assert_eq!(vs.resource_type, "ValueSet");
    assert_eq!(vs.status, PublicationStatus::Active);

    let compose = vs.compose.expect("compose should be present");
    assert_eq!(compose.include.len(), 1);

    let concepts = compose.include[0].concept.as_ref().expect("concepts should be present");
    assert_eq!(concepts.len(), 4);
    assert_eq!(concepts[0].code, "male");

    assert!(vs.extensions.contains_key("meta"));
    assert!(vs.extensions.contains_key("text"));
}

#[test]
fn parse_code_system_with_concepts() {
    let cs: CodeSystem = serde_json::from_value(json!({
        "resourceType": "CodeSystem",
        "url": "http://hl7.org/fhir/CodeSystem/example",
        "status": "active",
        "content": "complete",
        "concept": [
            {"code": "chol-mmol", "display": "SChol (mmol/L)"},
            {"code": "chol-mass", "display": "SChol (mg/L)"},
            {"code": "chol", "display": "SChol"}
        ],
        "text": {"status": "generated", "div": "<div/>"}
    }))
    .expect("code system should deserialize");

    assert_eq!(cs.resource_type, "CodeSystem");
    assert_eq!(cs.url, "http://hl7.org/fhir/CodeSystem/example");
    assert_eq!(cs.content, CodeSystemContentMode::Complete);

    let concepts = cs.concept.as_ref().expect("concepts should be present");
    assert_eq!(concepts.len(), 3);

    assert!(cs.extensions.contains_key("text"));
}

#[test]
fn round_trips_through_serialize_and_deserialize() {
    let original: CodeSystem = serde_json::from_value(json!({
        "resourceType": "CodeSystem",
        "url": "http://example.org/fhir/CodeSystem/demo",
        "status": "draft",
        "content": "fragment"
    }))
    .unwrap();

    let serialized = serde_json::to_value(&original).unwrap();
    let round_tripped: CodeSystem = serde_json::from_value(serialized).unwrap();
    assert_eq!(original, round_tripped);
}

#[test]
fn element_definition_constraint_carries_fhirpath_expression() {
    let constraint: ElementDefinitionConstraint = serde_json::from_value(json!({
        "key": "pat-1",
        "severity": "error",
        "human": "SHALL at least contain a contact's details or a reference to an organization",
        "expression": "name.exists() or telecom.exists() or address.exists() or organization.exists()"
    }))
    .expect("constraint should deserialize");

    assert_eq!(constraint.key, "pat-1");
    assert_eq!(constraint.severity, ConstraintSeverity::Error);
    assert!(constraint.expression.unwrap().contains("organization.exists()"));
}
