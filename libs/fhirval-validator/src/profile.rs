//! Profile aspect: constraint/invariant checks against declared or
//! auto-detected profiles (§4.6). Multiple profiles may apply; issue severity
//! follows the constraint's own severity, then is clamped by the pipeline to
//! the aspect's configured ceiling.

use crate::resource_type_of;
use fhirval_context::{Constraint, ConstraintSeverity, FhirContext, StructureDefinition};
use fhirval_core::{Aspect, Issue, IssueCode};
use serde_json::Value;

/// Profiles to validate against come from two places, both consulted:
/// - `explicit_profiles`, e.g. a caller-supplied `profileUrl` or the settings'
///   `profiles: list<profile-url>` (§3);
/// - `resource.meta.profile`, auto-detected per resource (§4.6 "auto-detected
///   profiles").
pub fn evaluate_profiles(
    resource: &Value,
    context: &dyn FhirContext,
    explicit_profiles: &[String],
) -> Vec<Issue> {
    let Some(resource_type) = resource_type_of(resource) else {
        return Vec::new(); // structural aspect already reported this.
    };

    let mut issues = Vec::new();

    // The base definition's own constraints (e.g. FHIR's `pat-1`) always apply.
    if let Ok(base) = context.base_definition(resource_type) {
        check_constraints(resource, &base.constraints, &mut issues);
    }

    for url in declared_profile_urls(resource, explicit_profiles) {
        match context.profile(&url) {
            Some(profile) => check_profile(resource, resource_type, profile, &mut issues),
            None => issues.push(
                Issue::warning(
                    IssueCode::NotFound,
                    Aspect::Profile,
                    format!("profile '{url}' is declared but not resolvable"),
                )
                .with_path("meta.profile"),
            ),
        }
    }

    issues
}

fn declared_profile_urls(resource: &Value, explicit: &[String]) -> Vec<String> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    resource
        .get("meta")
        .and_then(|m| m.get("profile"))
        .and_then(|p| p.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn check_profile(resource: &Value, resource_type: &str, profile: &StructureDefinition, issues: &mut Vec<Issue>) {
    if profile.resource_type != resource_type {
        issues.push(
            Issue::error(
                IssueCode::Invalid,
                Aspect::Profile,
                format!(
                    "profile '{}' targets resource type '{}' but resource is '{}'",
                    profile.url, profile.resource_type, resource_type
                ),
            )
            .with_path("meta.profile"),
        );
        return;
    }
    check_constraints(resource, &profile.constraints, issues);
}

fn check_constraints(resource: &Value, constraints: &[Constraint], issues: &mut Vec<Issue>) {
    for constraint in constraints {
        match fhirval_fhirpath::evaluate_bool(&constraint.expression, resource) {
            Ok(Some(false)) => issues.push(constraint_issue(constraint)),
            Ok(Some(true)) | Ok(None) => {}
            Err(e) => issues.push(
                Issue::internal_error(
                    Aspect::Profile,
                    format!("constraint '{}' failed to evaluate: {e}", constraint.key),
                )
                .with_expression(constraint.expression.clone()),
            ),
        }
    }
}

fn constraint_issue(constraint: &Constraint) -> Issue {
    let severity = match constraint.severity {
        ConstraintSeverity::Error => fhirval_core::Severity::Error,
        ConstraintSeverity::Warning => fhirval_core::Severity::Warning,
    };
    Issue::new(severity, IssueCode::Invariant, Aspect::Profile, constraint.human.clone())
        .with_expression(constraint.expression.clone())
        .with_category(constraint.key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhirval_context::StaticFhirContext;
    use serde_json::json;

    #[test]
    fn patient_without_name_or_identifier_violates_pat_1() {
        let ctx = StaticFhirContext::new();
        let patient = json!({"resourceType": "Patient"});
        let issues = evaluate_profiles(&patient, &ctx, &[]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category.as_deref(), Some("pat-1"));
    }

    #[test]
    fn patient_with_name_satisfies_pat_1() {
        let ctx = StaticFhirContext::new();
        let patient = json!({"resourceType": "Patient", "name": [{"family": "Doe"}]});
        assert!(evaluate_profiles(&patient, &ctx, &[]).is_empty());
    }

    #[test]
    fn unresolvable_declared_profile_is_a_warning_not_an_error() {
        let ctx = StaticFhirContext::new();
        let patient = json!({
            "resourceType": "Patient",
            "name": [{"family": "Doe"}],
            "meta": {"profile": ["https://example.org/fhir/StructureDefinition/missing"]},
        });
        let issues = evaluate_profiles(&patient, &ctx, &[]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, fhirval_core::Severity::Warning);
    }
}
