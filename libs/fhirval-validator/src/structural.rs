//! Structural aspect: type conformance, cardinality, primitive types, required
//! fields, and declared-vs-actual type mismatches, checked against the
//! installed `StructureDefinition` for the resource's declared type (§4.6).

use crate::{structural_missing_type_issue, resource_type_of};
use fhirval_context::FhirContext;
use fhirval_core::{Aspect, Issue, IssueCode};
use serde_json::Value;

/// `(resource, context) -> issues`. Pure and synchronous: no network or disk I/O,
/// per the evaluator contract in §4.6.
pub fn evaluate_structural(resource: &Value, context: &dyn FhirContext) -> Vec<Issue> {
    let Some(resource_type) = resource_type_of(resource) else {
        return vec![structural_missing_type_issue()];
    };

    let definition = match context.base_definition(resource_type) {
        Ok(def) => def,
        Err(_) => {
            return vec![Issue::error(
                IssueCode::NotSupported,
                Aspect::Structural,
                format!("unknown resource type '{resource_type}': no installed structure definition"),
            )
            .with_path("resourceType")];
        }
    };

    let Some(object) = resource.as_object() else {
        return vec![Issue::error(
            IssueCode::Structure,
            Aspect::Structural,
            "resource body must be a JSON object",
        )];
    };

    let mut issues = Vec::new();

    for element in &definition.elements {
        let Some(field) = element.path.split('.').nth(1) else { continue };
        let value = object.get(field);

        let count = match value {
            None | Some(Value::Null) => 0,
            Some(Value::Array(items)) => items.len() as u32,
            Some(_) => 1,
        };

        if count < element.min {
            issues.push(
                Issue::error(
                    IssueCode::Required,
                    Aspect::Structural,
                    format!("{} is required (min cardinality {})", element.path, element.min),
                )
                .with_path(element.path.clone()),
            );
            continue;
        }

        if !element.max.allows(count) {
            issues.push(
                Issue::error(
                    IssueCode::Structure,
                    Aspect::Structural,
                    format!("{} has {count} entries but allows at most one", element.path),
                )
                .with_path(element.path.clone()),
            );
            continue;
        }

        if let Some(v) = value {
            check_type(v, element, &mut issues);
        }
    }

    issues
}

fn check_type(value: &Value, element: &fhirval_context::ElementDefinition, issues: &mut Vec<Issue>) {
    if !element.is_primitive || element.types.is_empty() {
        return;
    }
    let values: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for v in values {
        let matches = element
            .types
            .iter()
            .any(|t| primitive_type_matches(t, v));
        if !matches {
            issues.push(
                Issue::error(
                    IssueCode::Value,
                    Aspect::Structural,
                    format!(
                        "{} declared as {:?} but value is {}",
                        element.path,
                        element.types,
                        json_kind(v)
                    ),
                )
                .with_path(element.path.clone()),
            );
        }
    }
}

fn primitive_type_matches(declared: &str, value: &Value) -> bool {
    match declared {
        "string" | "code" | "id" | "uri" | "url" | "canonical" | "date" | "dateTime" | "instant"
        | "time" | "markdown" | "base64Binary" | "oid" | "uuid" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" | "positiveInt" | "unsignedInt" => value.is_i64() || value.is_u64(),
        "decimal" => value.is_number(),
        _ => true, // complex types: structure checked per-element only at this depth.
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhirval_context::StaticFhirContext;
    use serde_json::json;

    #[test]
    fn missing_resource_type_is_a_single_structural_error() {
        let issues = evaluate_structural(&json!({}), &StaticFhirContext::new());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].aspect, Aspect::Structural);
    }

    #[test]
    fn unknown_resource_type_is_flagged() {
        let ctx = StaticFhirContext::new();
        let issues = evaluate_structural(&json!({"resourceType": "Frobnicator"}), &ctx);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::NotSupported);
    }

    #[test]
    fn valid_patient_has_no_structural_issues() {
        let ctx = StaticFhirContext::new();
        let patient = json!({
            "resourceType": "Patient",
            "gender": "male",
            "name": [{"family": "Doe"}],
        });
        assert!(evaluate_structural(&patient, &ctx).is_empty());
    }

    #[test]
    fn wrong_primitive_type_is_flagged() {
        let ctx = StaticFhirContext::new();
        let patient = json!({"resourceType": "Patient", "gender": 123});
        let issues = evaluate_structural(&patient, &ctx);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::Value);
    }

    #[test]
    fn cardinality_one_violated_by_array() {
        let ctx = StaticFhirContext::new();
        let patient = json!({"resourceType": "Patient", "gender": ["male", "female"]});
        let issues = evaluate_structural(&patient, &ctx);
        assert!(issues.iter().any(|i| i.code == IssueCode::Structure));
    }
}
