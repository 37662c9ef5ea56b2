use chrono::{DateTime, Utc};
use fhirval_core::{canonical_hash, ValidationSettings};
use serde::Serialize;

/// A manual, content-addressed snapshot of a settings version (§4.12,
/// SPEC_FULL supplemented feature). `content_hash` covers the full
/// serialized settings document (unlike `ValidationSettings::content_hash`,
/// which deliberately excludes identity fields for fingerprint dedup) —
/// a backup must detect identity tampering too.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBackup {
    pub id: String,
    pub description: String,
    pub actor: String,
    pub tags: Vec<String>,
    pub content_hash: String,
    pub settings: ValidationSettings,
    pub created_at: DateTime<Utc>,
}

impl SettingsBackup {
    pub fn new(description: String, actor: String, tags: Vec<String>, settings: ValidationSettings) -> Self {
        let content_hash = hash_of(&settings);
        Self { id: uuid::Uuid::new_v4().to_string(), description, actor, tags, content_hash, settings, created_at: Utc::now() }
    }

    pub fn verify(&self) -> bool {
        hash_of(&self.settings) == self.content_hash
    }
}

fn hash_of(settings: &ValidationSettings) -> String {
    canonical_hash(&serde_json::to_value(settings).expect("ValidationSettings always serializes"))
}
