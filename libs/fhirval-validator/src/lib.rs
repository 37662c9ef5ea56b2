//! Five of the six aspect evaluators (§4.6): structural, profile, metadata,
//! reference, and business-rule. The terminology aspect lives in
//! `fhirval-terminology` since it needs the batch code validator and network
//! clients; the pipeline in `fhirval-orchestrator` combines all six.
//!
//! Every evaluator here has the shape `(resource, ...) -> Vec<Issue>` and never
//! performs I/O, per §4.6 ("An evaluator whose aspect is disabled produces no
//! issues and must not perform I/O"). Each evaluator tags every issue it emits
//! with its `Aspect` directly — there is no post-hoc string-sniffing to infer
//! aspect from a message (§9 "Dynamic aspect tags on issues").

pub mod business_rule;
pub mod metadata;
pub mod profile;
pub mod reference;
pub mod structural;

pub use business_rule::{evaluate_business_rules, BusinessRule};
pub use metadata::evaluate_metadata;
pub use profile::evaluate_profiles;
pub use reference::{evaluate_references, ReferenceResolver};
pub use structural::evaluate_structural;

use fhirval_core::{Aspect, Issue, Severity};

/// Clamp every issue's severity to the aspect's configured ceiling (§3 `AspectToggle`,
/// expanded procedurally by SPEC_FULL.md's "Severity-aware issue suppression"). An
/// evaluator always emits at its natural severity; the pipeline (or, for convenience,
/// the caller here) never lets a configured `severity: warning` aspect count as an
/// `error`.
pub fn clamp_severity(mut issues: Vec<Issue>, ceiling: Severity) -> Vec<Issue> {
    for issue in &mut issues {
        if issue.severity > ceiling {
            issue.severity = ceiling;
        }
    }
    issues
}

/// True if `resource` is missing or has a non-string `resourceType` — the one
/// structural failure severe enough that the pipeline (§4.7 step 3) treats every
/// other aspect as not-run rather than meaningless.
pub fn missing_resource_type(resource: &serde_json::Value) -> bool {
    resource.get("resourceType").and_then(|v| v.as_str()).is_none()
}

pub(crate) fn resource_type_of(resource: &serde_json::Value) -> Option<&str> {
    resource.get("resourceType").and_then(|v| v.as_str())
}

pub(crate) fn structural_missing_type_issue() -> Issue {
    Issue::error(
        fhirval_core::IssueCode::Required,
        Aspect::Structural,
        "resource is missing a required 'resourceType' field",
    )
    .with_path("resourceType")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhirval_core::IssueCode;

    #[test]
    fn clamp_severity_never_raises_only_lowers() {
        let issues = vec![Issue::error(IssueCode::Invalid, Aspect::Profile, "x")];
        let clamped = clamp_severity(issues, Severity::Warning);
        assert_eq!(clamped[0].severity, Severity::Warning);
    }

    #[test]
    fn clamp_severity_is_a_no_op_below_ceiling() {
        let issues = vec![Issue::information(IssueCode::Informational, Aspect::Metadata, "x")];
        let clamped = clamp_severity(issues, Severity::Error);
        assert_eq!(clamped[0].severity, Severity::Information);
    }
}
