//! Reference aspect: syntactic reference checks and, when a resolver is
//! supplied, target-type/resolvability checks against the server (§4.6).
//!
//! Resolvability is optional because it requires network access to the FHIR
//! server the resource came from; the pipeline only passes a resolver when
//! the reference aspect's settings call for it. Without one, this evaluator
//! performs no I/O, matching the "disabled/no-resolver aspects must not
//! perform I/O" contract for the syntactic-only case.

use fhirval_core::{Aspect, Issue, IssueCode};
use serde_json::Value;

/// Resolves a `Reference.reference` string to a known resource, used for the
/// optional resolvability check. Implemented by callers that have access to
/// the source FHIR server or a local resource mirror.
pub trait ReferenceResolver {
    fn resolves(&self, reference: &str) -> bool;
}

pub fn evaluate_references(resource: &Value, resolver: Option<&dyn ReferenceResolver>) -> Vec<Issue> {
    let mut issues = Vec::new();
    walk(resource, String::new(), resolver, &mut issues);
    issues
}

fn walk(value: &Value, path: String, resolver: Option<&dyn ReferenceResolver>, issues: &mut Vec<Issue>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("reference") {
                check_reference(reference, &path, resolver, issues);
            }
            for (key, child) in map {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                walk(child, child_path, resolver, issues);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                walk(item, format!("{path}[{idx}]"), resolver, issues);
            }
        }
        _ => {}
    }
}

fn check_reference(reference: &str, path: &str, resolver: Option<&dyn ReferenceResolver>, issues: &mut Vec<Issue>) {
    if reference.is_empty() {
        issues.push(
            Issue::error(IssueCode::Invalid, Aspect::Reference, "reference is empty")
                .with_path(format!("{path}.reference")),
        );
        return;
    }

    if reference.starts_with('#') {
        return; // contained-resource reference: resolved locally, not via the server.
    }

    if !is_syntactically_valid(reference) {
        issues.push(
            Issue::error(
                IssueCode::Invalid,
                Aspect::Reference,
                format!("'{reference}' is not a valid relative or absolute reference"),
            )
            .with_path(format!("{path}.reference")),
        );
        return;
    }

    if let Some(resolver) = resolver {
        if !resolver.resolves(reference) {
            issues.push(
                Issue::error(
                    IssueCode::NotFound,
                    Aspect::Reference,
                    format!("'{reference}' does not resolve to a known resource"),
                )
                .with_path(format!("{path}.reference")),
            );
        }
    }
}

/// `Type/id`, `Type/id/_history/vid`, or an absolute `http(s)://.../Type/id` URL.
fn is_syntactically_valid(reference: &str) -> bool {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.split('/').count() >= 2;
    }
    if reference.starts_with("urn:uuid:") || reference.starts_with("urn:oid:") {
        return reference.len() > 9;
    }
    let parts: Vec<&str> = reference.split('/').collect();
    matches!(parts.len(), 2 | 4)
        && parts[0].chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && !parts[1].is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AlwaysResolves;
    impl ReferenceResolver for AlwaysResolves {
        fn resolves(&self, _reference: &str) -> bool {
            true
        }
    }
    struct NeverResolves;
    impl ReferenceResolver for NeverResolves {
        fn resolves(&self, _reference: &str) -> bool {
            false
        }
    }

    #[test]
    fn valid_relative_reference_has_no_issues() {
        let obs = json!({"resourceType": "Observation", "subject": {"reference": "Patient/p1"}});
        assert!(evaluate_references(&obs, None).is_empty());
    }

    #[test]
    fn contained_reference_is_always_fine() {
        let obs = json!({"resourceType": "Observation", "subject": {"reference": "#p1"}});
        assert!(evaluate_references(&obs, None).is_empty());
    }

    #[test]
    fn malformed_reference_is_flagged() {
        let obs = json!({"resourceType": "Observation", "subject": {"reference": "not a reference"}});
        let issues = evaluate_references(&obs, None);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn resolvability_check_only_runs_with_a_resolver() {
        let obs = json!({"resourceType": "Observation", "subject": {"reference": "Patient/missing"}});
        assert!(evaluate_references(&obs, None).is_empty());
        assert!(evaluate_references(&obs, Some(&AlwaysResolves)).is_empty());
        assert_eq!(evaluate_references(&obs, Some(&NeverResolves)).len(), 1);
    }
}
