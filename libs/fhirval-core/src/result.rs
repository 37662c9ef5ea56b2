use crate::aspect::{Aspect, Severity};
use crate::issue::Issue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-aspect rollup of an evaluator's issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectBreakdown {
    pub issue_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub information_count: usize,
    pub validation_score: u8,
    pub passed: bool,
    pub enabled: bool,
}

impl AspectBreakdown {
    pub fn disabled() -> Self {
        Self {
            issue_count: 0,
            error_count: 0,
            warning_count: 0,
            information_count: 0,
            validation_score: 100,
            passed: true,
            enabled: false,
        }
    }

    pub fn from_issues(issues: &[Issue]) -> Self {
        let error_count = issues.iter().filter(|i| i.severity >= Severity::Error).count();
        let warning_count = issues.iter().filter(|i| i.severity == Severity::Warning).count();
        let information_count = issues
            .iter()
            .filter(|i| i.severity == Severity::Information)
            .count();
        Self {
            issue_count: issues.len(),
            error_count,
            warning_count,
            information_count,
            validation_score: penalty_score(error_count, warning_count, information_count),
            passed: error_count == 0,
            enabled: true,
        }
    }
}

/// `validationScore = max(0, 100 - 15E - 5W - 1I)`, shared by per-aspect and
/// overall scoring so the two numbers are always computed the same way.
pub fn penalty_score(errors: usize, warnings: usize, informational: usize) -> u8 {
    let penalty = 15 * errors as i64 + 5 * warnings as i64 + informational as i64;
    (100 - penalty).clamp(0, 100) as u8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub settings_hash: String,
    pub resource_hash: String,
    pub validated_at: DateTime<Utc>,
    pub is_valid: bool,
    pub validation_score: u8,
    pub error_count: usize,
    pub warning_count: usize,
    pub information_count: usize,
    pub issues: Vec<Issue>,
    pub aspect_breakdown: HashMap<Aspect, AspectBreakdown>,
}

impl ValidationResult {
    /// Build the result from the per-aspect issue lists produced by one pipeline run.
    /// Only `enabled` aspects contribute to the overall score and counts, per §3/§4.7.
    pub fn assemble(
        resource_type: String,
        resource_id: String,
        settings_hash: String,
        resource_hash: String,
        per_aspect: HashMap<Aspect, Vec<Issue>>,
        enabled: &[Aspect],
    ) -> Self {
        let mut aspect_breakdown = HashMap::new();
        let mut all_issues = Vec::new();
        let mut errors = 0usize;
        let mut warnings = 0usize;
        let mut informational = 0usize;

        for aspect in Aspect::ALL {
            if enabled.contains(&aspect) {
                let issues = per_aspect.get(&aspect).cloned().unwrap_or_default();
                let breakdown = AspectBreakdown::from_issues(&issues);
                errors += breakdown.error_count;
                warnings += breakdown.warning_count;
                informational += breakdown.information_count;
                all_issues.extend(issues);
                aspect_breakdown.insert(aspect, breakdown);
            } else {
                aspect_breakdown.insert(aspect, AspectBreakdown::disabled());
            }
        }

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resource_type,
            resource_id,
            settings_hash,
            resource_hash,
            validated_at: Utc::now(),
            is_valid: errors == 0,
            validation_score: penalty_score(errors, warnings, informational),
            error_count: errors,
            warning_count: warnings,
            information_count: informational,
            issues: all_issues,
            aspect_breakdown,
        }
    }

    /// Field-wise equality ignoring `validated_at`, used by the fingerprint idempotence
    /// property in §8.
    pub fn content_eq(&self, other: &ValidationResult) -> bool {
        self.resource_type == other.resource_type
            && self.resource_id == other.resource_id
            && self.settings_hash == other.settings_hash
            && self.resource_hash == other.resource_hash
            && self.is_valid == other.is_valid
            && self.validation_score == other.validation_score
            && self.error_count == other.error_count
            && self.warning_count == other.warning_count
            && self.information_count == other.information_count
            && self.issues == other.issues
    }

    /// Re-score a stored result against a (possibly different) settings snapshot without
    /// re-running evaluators — the pure projection function from the §9 "Result filtering
    /// at read time" design note. Used by both list and detail read paths.
    pub fn project(&self, enabled: &[Aspect]) -> ProjectedResult {
        let mut errors = 0usize;
        let mut warnings = 0usize;
        let mut informational = 0usize;
        let mut breakdown = HashMap::new();

        for aspect in Aspect::ALL {
            if enabled.contains(&aspect) {
                if let Some(b) = self.aspect_breakdown.get(&aspect) {
                    errors += b.error_count;
                    warnings += b.warning_count;
                    informational += b.information_count;
                    breakdown.insert(aspect, b.clone());
                }
            } else {
                breakdown.insert(aspect, AspectBreakdown::disabled());
            }
        }

        ProjectedResult {
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id.clone(),
            is_valid: errors == 0,
            validation_score: penalty_score(errors, warnings, informational),
            error_count: errors,
            warning_count: warnings,
            information_count: informational,
            aspect_breakdown: breakdown,
        }
    }
}

/// The read-time view of a stored result, rescored for the currently active settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedResult {
    pub resource_type: String,
    pub resource_id: String,
    pub is_valid: bool,
    pub validation_score: u8,
    pub error_count: usize,
    pub warning_count: usize,
    pub information_count: usize,
    pub aspect_breakdown: HashMap<Aspect, AspectBreakdown>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueCode;

    #[test]
    fn fully_disabled_settings_yield_perfect_score() {
        let result = ValidationResult::assemble(
            "Patient".into(),
            "p1".into(),
            "settings-hash".into(),
            "resource-hash".into(),
            HashMap::new(),
            &[],
        );
        assert_eq!(result.validation_score, 100);
        assert!(result.is_valid);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn is_valid_iff_zero_enabled_errors() {
        let mut per_aspect = HashMap::new();
        per_aspect.insert(
            Aspect::Terminology,
            vec![Issue::error(IssueCode::CodeInvalid, Aspect::Terminology, "bad code")],
        );
        let result = ValidationResult::assemble(
            "Patient".into(),
            "p2".into(),
            "sh".into(),
            "rh".into(),
            per_aspect,
            &[Aspect::Terminology],
        );
        assert!(!result.is_valid);
        assert_eq!(result.error_count, 1);
        assert!(result.validation_score <= 85);
    }

    #[test]
    fn projection_recomputes_without_mutating_storage() {
        let mut per_aspect = HashMap::new();
        per_aspect.insert(
            Aspect::Terminology,
            vec![
                Issue::error(IssueCode::CodeInvalid, Aspect::Terminology, "a"),
                Issue::error(IssueCode::CodeInvalid, Aspect::Terminology, "b"),
            ],
        );
        let stored = ValidationResult::assemble(
            "Patient".into(),
            "p3".into(),
            "sh".into(),
            "rh".into(),
            per_aspect,
            &[Aspect::Terminology, Aspect::Structural],
        );
        assert_eq!(stored.error_count, 2);

        let projected = stored.project(&[Aspect::Structural]);
        assert_eq!(projected.error_count, 0);
        assert!(projected.is_valid);
        assert_eq!(projected.validation_score, 100);
        // storage itself is untouched
        assert_eq!(stored.error_count, 2);
    }

    #[test]
    fn penalty_score_clamps_at_zero() {
        assert_eq!(penalty_score(10, 0, 0), 0);
        assert_eq!(penalty_score(0, 0, 0), 100);
    }
}
