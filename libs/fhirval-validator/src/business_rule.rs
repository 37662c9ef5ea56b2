//! Business-rule aspect: FHIRPath rule execution, where rules may come from
//! profiles (already covered by the profile aspect's constraint checks) or
//! from settings' custom rules (§4.6).

use fhirval_core::{Aspect, Issue, IssueCode, Severity};
use serde_json::Value;

/// A custom business rule configured on `ValidationSettings` (or a preset),
/// independent of any profile's own invariants.
#[derive(Debug, Clone)]
pub struct BusinessRule {
    pub id: String,
    pub expression: String,
    pub message: String,
    pub severity: Severity,
}

pub fn evaluate_business_rules(resource: &Value, rules: &[BusinessRule]) -> Vec<Issue> {
    let mut issues = Vec::new();
    for rule in rules {
        match fhirval_fhirpath::evaluate_bool(&rule.expression, resource) {
            Ok(Some(false)) => issues.push(
                Issue::new(rule.severity, IssueCode::BusinessRule, Aspect::BusinessRule, rule.message.clone())
                    .with_expression(rule.expression.clone())
                    .with_category(rule.id.clone()),
            ),
            Ok(Some(true)) | Ok(None) => {}
            Err(e) => issues.push(
                Issue::internal_error(
                    Aspect::BusinessRule,
                    format!("rule '{}' failed to evaluate: {e}", rule.id),
                )
                .with_expression(rule.expression.clone()),
            ),
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn violated_rule_produces_issue_at_configured_severity() {
        let rules = vec![BusinessRule {
            id: "custom-1".into(),
            expression: "identifier.exists()".into(),
            message: "patient must carry an identifier".into(),
            severity: Severity::Warning,
        }];
        let issues = evaluate_business_rules(&json!({"resourceType": "Patient"}), &rules);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].category.as_deref(), Some("custom-1"));
    }

    #[test]
    fn satisfied_rule_produces_no_issue() {
        let rules = vec![BusinessRule {
            id: "custom-1".into(),
            expression: "identifier.exists()".into(),
            message: "patient must carry an identifier".into(),
            severity: Severity::Error,
        }];
        let resource = json!({"resourceType": "Patient", "identifier": [{"value": "123"}]});
        assert!(evaluate_business_rules(&resource, &rules).is_empty());
    }
}
