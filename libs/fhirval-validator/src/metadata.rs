//! Metadata aspect: `meta.profile`, `meta.security`, `meta.tag`, and
//! narrative presence/integrity (§4.6).

use crate::resource_type_of;
use fhirval_core::{Aspect, Issue, IssueCode};
use serde_json::Value;

pub fn evaluate_metadata(resource: &Value) -> Vec<Issue> {
    if resource_type_of(resource).is_none() {
        return Vec::new();
    }

    let mut issues = Vec::new();
    let meta = resource.get("meta");

    if let Some(meta) = meta {
        check_coded_list(meta, "profile", Value::as_str, &mut issues);
        check_coded_list(meta, "security", |v| v.get("system").and_then(Value::as_str), &mut issues);
        check_coded_list(meta, "tag", |v| v.get("system").and_then(Value::as_str), &mut issues);
    }

    check_narrative(resource, &mut issues);

    issues
}

fn check_coded_list(
    meta: &Value,
    field: &str,
    key_of: impl Fn(&Value) -> Option<&str>,
    issues: &mut Vec<Issue>,
) {
    let Some(entries) = meta.get(field).and_then(Value::as_array) else {
        return;
    };
    for (idx, entry) in entries.iter().enumerate() {
        if key_of(entry).map(str::is_empty).unwrap_or(true) {
            issues.push(
                Issue::warning(
                    IssueCode::Value,
                    Aspect::Metadata,
                    format!("meta.{field}[{idx}] is missing its identifying system/value"),
                )
                .with_path(format!("meta.{field}[{idx}]")),
            );
        }
    }
}

/// A `div` that is present but empty, or marked `generated`/`additional` without
/// content, fails the narrative-integrity check FHIR servers apply to `text`.
fn check_narrative(resource: &Value, issues: &mut Vec<Issue>) {
    let Some(text) = resource.get("text") else { return };
    let status = text.get("status").and_then(Value::as_str);
    let div = text.get("div").and_then(Value::as_str).unwrap_or("");

    if matches!(status, Some("generated") | Some("additional")) && div.trim().is_empty() {
        issues.push(
            Issue::warning(
                IssueCode::Value,
                Aspect::Metadata,
                format!(
                    "text.status is '{}' but text.div has no content",
                    status.unwrap_or("")
                ),
            )
            .with_path("text.div"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_resource_type_is_skipped() {
        assert!(evaluate_metadata(&json!({})).is_empty());
    }

    #[test]
    fn security_label_without_system_is_flagged() {
        let resource = json!({
            "resourceType": "Patient",
            "meta": {"security": [{"code": "R"}]},
        });
        let issues = evaluate_metadata(&resource);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].aspect, Aspect::Metadata);
    }

    #[test]
    fn generated_narrative_with_empty_div_is_flagged() {
        let resource = json!({
            "resourceType": "Patient",
            "text": {"status": "generated", "div": "   "},
        });
        let issues = evaluate_metadata(&resource);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn well_formed_metadata_has_no_issues() {
        let resource = json!({
            "resourceType": "Patient",
            "meta": {
                "profile": ["https://example.org/fhir/StructureDefinition/my-patient"],
                "security": [{"system": "http://terminology.hl7.org/CodeSystem/v3-ActCode", "code": "R"}],
            },
            "text": {"status": "generated", "div": "<div>Jane Doe</div>"},
        });
        assert!(evaluate_metadata(&resource).is_empty());
    }
}
