use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub lineage_id: String,
    pub settings_id: String,
    pub action: String,
    pub actor: String,
    pub previous_version: Option<u32>,
    pub new_version: Option<u32>,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        lineage_id: impl Into<String>,
        settings_id: impl Into<String>,
        action: impl Into<String>,
        actor: impl Into<String>,
        previous_version: Option<u32>,
        new_version: Option<u32>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lineage_id: lineage_id.into(),
            settings_id: settings_id.into(),
            action: action.into(),
            actor: actor.into(),
            previous_version,
            new_version,
            at: Utc::now(),
        }
    }
}
