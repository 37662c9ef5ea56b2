use crate::aspect::{Aspect, FhirVersion, Severity};
use crate::hash::canonical_hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationMode {
    Online,
    Offline,
}

/// Per-aspect toggle: whether the evaluator runs, and the severity ceiling it is
/// allowed to report at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectToggle {
    pub enabled: bool,
    pub severity: Severity,
}

impl Default for AspectToggle {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminologyServer {
    pub id: String,
    pub name: String,
    pub url: String,
    pub fhir_versions: HashSet<String>,
    pub priority: i32,
    pub enabled: bool,
    #[serde(default)]
    pub circuit_open: bool,
    #[serde(default)]
    pub last_failure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl TerminologyServer {
    pub fn supports(&self, version: FhirVersion) -> bool {
        self.fhir_versions.contains(&version.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRef {
    pub id: String,
    pub url: String,
}

/// The authoritative, versioned validation configuration. Exactly one lineage member
/// is ever `is_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSettings {
    pub id: String,
    pub lineage_id: String,
    pub version: u32,
    pub is_active: bool,

    pub structural: AspectToggle,
    pub profile: AspectToggle,
    pub terminology: AspectToggle,
    pub reference: AspectToggle,
    pub business_rule: AspectToggle,
    pub metadata: AspectToggle,

    pub strict_mode: bool,
    pub profiles: Vec<String>,
    pub terminology_servers: Vec<TerminologyServer>,
    pub profile_resolution_servers: Vec<ServerRef>,
    pub mode: ValidationMode,
    pub terminology_fallback_url: String,
    pub offline_ontoserver_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl ValidationSettings {
    pub fn aspect_toggle(&self, aspect: Aspect) -> &AspectToggle {
        match aspect {
            Aspect::Structural => &self.structural,
            Aspect::Profile => &self.profile,
            Aspect::Terminology => &self.terminology,
            Aspect::Reference => &self.reference,
            Aspect::BusinessRule => &self.business_rule,
            Aspect::Metadata => &self.metadata,
        }
    }

    pub fn is_enabled(&self, aspect: Aspect) -> bool {
        self.aspect_toggle(aspect).enabled
    }

    pub fn enabled_aspects(&self) -> Vec<Aspect> {
        Aspect::ALL.into_iter().filter(|a| self.is_enabled(*a)).collect()
    }

    /// Stable canonical hash of the content that determines validation behavior.
    /// Identity fields (id, lineage, version, timestamps, audit actor) are excluded:
    /// two settings with identical validation-relevant content hash equal, which is
    /// what gives the fingerprint cache (§4.8) its dedup power.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::json!({
            "structural": toggle_json(&self.structural),
            "profile": toggle_json(&self.profile),
            "terminology": toggle_json(&self.terminology),
            "reference": toggle_json(&self.reference),
            "businessRule": toggle_json(&self.business_rule),
            "metadata": toggle_json(&self.metadata),
            "strictMode": self.strict_mode,
            "profiles": self.profiles,
            "mode": matches!(self.mode, ValidationMode::Online),
        });
        canonical_hash(&canonical)
    }

    pub fn default_settings(actor: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lineage_id: uuid::Uuid::new_v4().to_string(),
            version: 1,
            is_active: true,
            structural: AspectToggle::default(),
            profile: AspectToggle::default(),
            terminology: AspectToggle::default(),
            reference: AspectToggle::default(),
            business_rule: AspectToggle::default(),
            metadata: AspectToggle::default(),
            strict_mode: false,
            profiles: Vec::new(),
            terminology_servers: Vec::new(),
            profile_resolution_servers: Vec::new(),
            mode: ValidationMode::Online,
            terminology_fallback_url: "https://tx.fhir.org".to_string(),
            offline_ontoserver_url: None,
            created_at: now,
            created_by: actor.to_string(),
        }
    }
}

fn toggle_json(t: &AspectToggle) -> serde_json::Value {
    serde_json::json!({"enabled": t.enabled, "severity": t.severity.to_string()})
}

/// Named starting points for `applyPreset` (§4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Strict,
    Lenient,
    Ingestion,
}

impl Preset {
    pub fn apply(self, base: ValidationSettings) -> ValidationSettings {
        let mut s = base;
        match self {
            Preset::Strict => {
                for t in [
                    &mut s.structural,
                    &mut s.profile,
                    &mut s.terminology,
                    &mut s.reference,
                    &mut s.business_rule,
                    &mut s.metadata,
                ] {
                    t.enabled = true;
                    t.severity = Severity::Error;
                }
                s.strict_mode = true;
            }
            Preset::Lenient => {
                s.terminology.enabled = false;
                s.business_rule.enabled = false;
                s.strict_mode = false;
            }
            Preset::Ingestion => {
                s.structural.enabled = true;
                s.terminology.enabled = true;
                s.profile.enabled = false;
                s.reference.enabled = false;
                s.business_rule.enabled = false;
                s.metadata.enabled = false;
            }
        }
        s
    }

    pub fn id(self) -> &'static str {
        match self {
            Preset::Strict => "strict",
            Preset::Lenient => "lenient",
            Preset::Ingestion => "ingestion",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "strict" => Some(Preset::Strict),
            "lenient" => Some(Preset::Lenient),
            "ingestion" => Some(Preset::Ingestion),
            _ => None,
        }
    }
}

/// Result of `validateSettings` (§4.12): structural validity of a candidate settings
/// document before it is persisted as a new version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

pub fn validate_candidate(
    candidate: &ValidationSettings,
    known_terminology_server_ids: &HashMap<String, bool>,
) -> SettingsValidation {
    let mut out = SettingsValidation::default();

    if candidate.profile_resolution_servers.is_empty() && !candidate.profiles.is_empty() {
        out.suggestions
            .push("profiles are declared but no profile resolution servers are configured".to_string());
    }

    for server in &candidate.terminology_servers {
        match known_terminology_server_ids.get(&server.id) {
            Some(true) => {}
            Some(false) => out
                .warnings
                .push(format!("terminology server '{}' is registered but disabled", server.id)),
            None => out
                .errors
                .push(format!("terminology server '{}' does not exist", server.id)),
        }
    }

    if candidate.terminology.enabled
        && candidate.terminology_servers.is_empty()
        && matches!(candidate.mode, ValidationMode::Online)
        && candidate.offline_ontoserver_url.is_none()
    {
        out.warnings
            .push("terminology aspect is enabled but no terminology servers are configured; falling back to core tables and the default endpoint".to_string());
    }

    out.is_valid = out.errors.is_empty();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_ignores_identity_fields() {
        let a = ValidationSettings::default_settings("alice");
        let mut b = a.clone();
        b.id = uuid::Uuid::new_v4().to_string();
        b.version = 7;
        b.created_by = "bob".to_string();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn content_hash_changes_when_aspect_toggled() {
        let a = ValidationSettings::default_settings("alice");
        let mut b = a.clone();
        b.terminology.enabled = false;
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn lenient_preset_disables_terminology_and_business_rule() {
        let base = ValidationSettings::default_settings("alice");
        let lenient = Preset::Lenient.apply(base);
        assert!(!lenient.terminology.enabled);
        assert!(!lenient.business_rule.enabled);
        assert!(lenient.structural.enabled);
    }

    #[test]
    fn validate_candidate_flags_unknown_terminology_server() {
        let mut candidate = ValidationSettings::default_settings("alice");
        candidate.terminology_servers.push(TerminologyServer {
            id: "missing".to_string(),
            name: "Missing".to_string(),
            url: "https://example.org".to_string(),
            fhir_versions: HashSet::from(["r4".to_string()]),
            priority: 0,
            enabled: true,
            circuit_open: false,
            last_failure: None,
            consecutive_failures: 0,
        });
        let result = validate_candidate(&candidate, &HashMap::new());
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
    }
}
