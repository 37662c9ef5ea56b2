//! §4.12 Settings Service: the authoritative, versioned store of
//! `ValidationSettings`. Writes are serialized behind a single actor (a
//! `tokio::sync::RwLock` over the whole store); reads take a cloned
//! snapshot so callers never hold the lock across a validation run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fhirval_core::{validate_candidate, Preset, SettingsValidation, ValidationSettings};
use tokio::sync::RwLock;
use tracing::info;

use crate::audit::AuditEntry;
use crate::backup::SettingsBackup;
use crate::error::{Result, SettingsError};
use crate::events::{EventBus, SettingsEvent};

const BACKUP_RETENTION_DAYS: i64 = 90;
const MIN_RETAINED_BACKUPS: usize = 5;

#[derive(Default)]
struct Inner {
    /// lineage_id -> versions, ascending by version number.
    lineages: HashMap<String, Vec<ValidationSettings>>,
    audit: Vec<AuditEntry>,
    backups: HashMap<String, SettingsBackup>,
}

impl Inner {
    fn find(&self, id: &str) -> Option<(&str, usize)> {
        for (lineage_id, versions) in &self.lineages {
            if let Some(idx) = versions.iter().position(|v| v.id == id) {
                return Some((lineage_id.as_str(), idx));
            }
        }
        None
    }

    fn active(&self) -> Option<&ValidationSettings> {
        self.lineages.values().flatten().find(|v| v.is_active)
    }

    fn active_mut(&mut self) -> Option<&mut ValidationSettings> {
        self.lineages.values_mut().flatten().find(|v| v.is_active)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub total_activations: u64,
    pub total_updates: u64,
    pub total_creations: u64,
    pub total_rollbacks: u64,
    pub active_lineage_id: String,
    pub active_version: u32,
    pub details: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Activate the restored version immediately rather than leaving it as a draft.
    pub activate: bool,
}

pub struct SettingsService {
    inner: RwLock<Inner>,
    events: std::sync::Arc<EventBus>,
}

impl SettingsService {
    /// Bootstraps with one active, default lineage (§3: "exactly one record
    /// has isActive = true" must hold from the very first read).
    pub fn new(actor: &str, events: std::sync::Arc<EventBus>) -> Self {
        let bootstrap = ValidationSettings::default_settings(actor);
        let mut lineages = HashMap::new();
        lineages.insert(bootstrap.lineage_id.clone(), vec![bootstrap]);
        Self { inner: RwLock::new(Inner { lineages, audit: Vec::new(), backups: HashMap::new() }), events }
    }

    pub async fn get_active_settings(&self) -> ValidationSettings {
        self.inner.read().await.active().cloned().expect("bootstrap guarantees one active settings record")
    }

    pub async fn create_settings(&self, mut candidate: ValidationSettings, actor: &str) -> Result<ValidationSettings> {
        let validation = self.validate_settings(&candidate).await;
        if !validation.is_valid {
            return Err(SettingsError::Validation(validation.errors.join("; ")));
        }

        candidate.id = uuid::Uuid::new_v4().to_string();
        candidate.lineage_id = uuid::Uuid::new_v4().to_string();
        candidate.version = 1;
        candidate.is_active = false;
        candidate.created_at = Utc::now();
        candidate.created_by = actor.to_string();

        let mut inner = self.inner.write().await;
        inner.lineages.insert(candidate.lineage_id.clone(), vec![candidate.clone()]);
        inner
            .audit
            .push(AuditEntry::new(&candidate.lineage_id, &candidate.id, "created", actor, None, Some(1)));
        Ok(candidate)
    }

    /// `createNewVersion` defaults to `true` per §4.12 ("any successful update
    /// produces a new version"); set it `false` only to correct an unactivated
    /// draft in place.
    pub async fn update_settings(
        &self,
        id: &str,
        mut new_content: ValidationSettings,
        create_new_version: bool,
        actor: &str,
    ) -> Result<ValidationSettings> {
        let validation = self.validate_settings(&new_content).await;
        if !validation.is_valid {
            return Err(SettingsError::Validation(validation.errors.join("; ")));
        }

        let mut inner = self.inner.write().await;
        let (lineage_id, idx) = inner.find(id).map(|(l, i)| (l.to_string(), i)).ok_or_else(|| SettingsError::NotFound(id.to_string()))?;
        let versions = inner.lineages.get_mut(&lineage_id).expect("lineage exists");
        let current = versions[idx].clone();

        new_content.lineage_id = lineage_id.clone();
        new_content.created_by = actor.to_string();
        new_content.created_at = Utc::now();

        let result = if create_new_version {
            let next_version = versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;
            new_content.id = uuid::Uuid::new_v4().to_string();
            new_content.version = next_version;
            new_content.is_active = false;
            versions.push(new_content.clone());
            inner.audit.push(AuditEntry::new(&lineage_id, &new_content.id, "updated", actor, Some(current.version), Some(next_version)));
            new_content
        } else {
            new_content.id = current.id.clone();
            new_content.version = current.version;
            new_content.is_active = current.is_active;
            versions[idx] = new_content.clone();
            inner.audit.push(AuditEntry::new(&lineage_id, &new_content.id, "updated-in-place", actor, Some(current.version), Some(current.version)));
            new_content
        };
        Ok(result)
    }

    /// Idempotent: activating the already-active id is a no-op and emits no
    /// `settingsChanged` event (§8 invariant).
    pub async fn activate_settings(&self, id: &str, actor: &str) -> Result<ValidationSettings> {
        let mut inner = self.inner.write().await;
        if let Some(active) = inner.active() {
            if active.id == id {
                return Ok(active.clone());
            }
        }

        let (lineage_id, idx) = inner.find(id).map(|(l, i)| (l.to_string(), i)).ok_or_else(|| SettingsError::NotFound(id.to_string()))?;
        let previous_version = inner.active().map(|a| a.version);

        if let Some(prev) = inner.active_mut() {
            prev.is_active = false;
        }
        let versions = inner.lineages.get_mut(&lineage_id).expect("lineage exists");
        versions[idx].is_active = true;
        let activated = versions[idx].clone();

        inner.audit.push(AuditEntry::new(&lineage_id, &activated.id, "activated", actor, previous_version, Some(activated.version)));
        drop(inner);

        self.events.emit(SettingsEvent::SettingsActivated {
            previous_version,
            new_version: activated.version,
            content: activated.clone(),
        });
        self.events.emit(SettingsEvent::SettingsChanged {
            previous_version,
            new_version: activated.version,
            content: activated.clone(),
        });
        info!(settings_id = %activated.id, version = activated.version, "settings activated");
        Ok(activated)
    }

    pub async fn validate_settings(&self, candidate: &ValidationSettings) -> SettingsValidation {
        let inner = self.inner.read().await;
        let known: HashMap<String, bool> = inner
            .active()
            .map(|a| a.terminology_servers.iter().map(|s| (s.id.clone(), s.enabled)).collect())
            .unwrap_or_default();
        validate_candidate(candidate, &known)
    }

    pub async fn apply_preset(&self, preset_id: &str, actor: &str) -> Result<ValidationSettings> {
        let preset = Preset::from_id(preset_id).ok_or_else(|| SettingsError::Validation(format!("unknown preset '{preset_id}'")))?;
        let active = self.get_active_settings().await;
        let applied = preset.apply(active.clone());
        let created = self.update_settings(&active.id, applied, true, actor).await?;
        self.activate_settings(&created.id, actor).await
    }

    pub async fn rollback_to_version(&self, lineage_id: &str, version: u32, actor: &str) -> Result<ValidationSettings> {
        let mut inner = self.inner.write().await;
        let versions = inner.lineages.get(lineage_id).ok_or_else(|| SettingsError::NotFound(lineage_id.to_string()))?;
        let snapshot = versions
            .iter()
            .find(|v| v.version == version)
            .cloned()
            .ok_or_else(|| SettingsError::NotFound(format!("{lineage_id}@v{version}")))?;
        let next_version = versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;

        let mut restored = snapshot.clone();
        restored.id = uuid::Uuid::new_v4().to_string();
        restored.version = next_version;
        restored.is_active = false;
        restored.created_at = Utc::now();
        restored.created_by = actor.to_string();

        let versions = inner.lineages.get_mut(lineage_id).expect("lineage exists");
        versions.push(restored.clone());
        inner.audit.push(AuditEntry::new(lineage_id, &restored.id, "rolled-back", actor, Some(version), Some(next_version)));
        drop(inner);

        self.activate_settings(&restored.id, actor).await
    }

    pub async fn get_history(&self, id: &str, limit: usize, offset: usize) -> Result<Vec<ValidationSettings>> {
        let inner = self.inner.read().await;
        let (lineage_id, _) = inner.find(id).ok_or_else(|| SettingsError::NotFound(id.to_string()))?;
        let mut versions = inner.lineages.get(lineage_id).cloned().unwrap_or_default();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions.into_iter().skip(offset).take(limit).collect())
    }

    pub async fn get_statistics(&self, time_range: Option<(DateTime<Utc>, DateTime<Utc>)>, include_details: bool) -> StatisticsReport {
        let inner = self.inner.read().await;
        let entries: Vec<_> = inner
            .audit
            .iter()
            .filter(|e| time_range.map(|(from, to)| e.at >= from && e.at <= to).unwrap_or(true))
            .cloned()
            .collect();

        let active = inner.active();
        StatisticsReport {
            total_activations: entries.iter().filter(|e| e.action == "activated").count() as u64,
            total_updates: entries.iter().filter(|e| e.action.starts_with("updated")).count() as u64,
            total_creations: entries.iter().filter(|e| e.action == "created").count() as u64,
            total_rollbacks: entries.iter().filter(|e| e.action == "rolled-back").count() as u64,
            active_lineage_id: active.map(|a| a.lineage_id.clone()).unwrap_or_default(),
            active_version: active.map(|a| a.version).unwrap_or(0),
            details: if include_details { entries } else { Vec::new() },
        }
    }

    pub async fn get_audit_trail(&self, settings_id: Option<&str>, limit: usize) -> Vec<AuditEntry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .audit
            .iter()
            .filter(|e| settings_id.map(|id| e.settings_id == id).unwrap_or(true))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.at.cmp(&a.at));
        entries.truncate(limit);
        entries
    }

    pub async fn create_manual_backup(&self, description: &str, actor: &str, tags: Vec<String>) -> SettingsBackup {
        let active = self.get_active_settings().await;
        let backup = SettingsBackup::new(description.to_string(), actor.to_string(), tags, active);
        let mut inner = self.inner.write().await;
        inner.backups.insert(backup.id.clone(), backup.clone());
        backup
    }

    pub async fn list_backups(&self) -> Vec<SettingsBackup> {
        let inner = self.inner.read().await;
        let mut backups: Vec<_> = inner.backups.values().cloned().collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        backups
    }

    pub async fn verify_backup(&self, id: &str) -> Result<bool> {
        let inner = self.inner.read().await;
        let backup = inner.backups.get(id).ok_or_else(|| SettingsError::BackupNotFound(id.to_string()))?;
        Ok(backup.verify())
    }

    pub async fn restore_from_backup(&self, id: &str, options: RestoreOptions, actor: &str) -> Result<ValidationSettings> {
        let backup = {
            let inner = self.inner.read().await;
            inner.backups.get(id).cloned().ok_or_else(|| SettingsError::BackupNotFound(id.to_string()))?
        };
        if !backup.verify() {
            return Err(SettingsError::BackupCorrupt(id.to_string()));
        }

        let update_result = self.update_settings(&backup.settings.id, backup.settings.clone(), true, actor).await;
        let restored = match update_result {
            Ok(restored) => restored,
            // Original lineage no longer exists; recreate it fresh from the snapshot.
            Err(SettingsError::NotFound(_)) => self.create_settings(backup.settings.clone(), actor).await?,
            Err(other) => return Err(other),
        };

        if options.activate {
            self.activate_settings(&restored.id, actor).await
        } else {
            Ok(restored)
        }
    }

    pub async fn delete_backup(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.backups.remove(id).ok_or_else(|| SettingsError::BackupNotFound(id.to_string()))?;
        Ok(())
    }

    /// Keeps the `MIN_RETAINED_BACKUPS` most recent backups unconditionally;
    /// beyond that, prunes anything older than `BACKUP_RETENTION_DAYS`.
    pub async fn cleanup_old_backups(&self) -> usize {
        let mut inner = self.inner.write().await;
        let mut sorted: Vec<_> = inner.backups.values().map(|b| (b.id.clone(), b.created_at)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));

        let cutoff = Utc::now() - chrono::Duration::days(BACKUP_RETENTION_DAYS);
        let to_remove: Vec<String> = sorted
            .into_iter()
            .skip(MIN_RETAINED_BACKUPS)
            .filter(|(_, created_at)| *created_at < cutoff)
            .map(|(id, _)| id)
            .collect();

        let removed = to_remove.len();
        for id in to_remove {
            inner.backups.remove(&id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SettingsService {
        SettingsService::new("tester", std::sync::Arc::new(EventBus::new(16)))
    }

    #[tokio::test]
    async fn bootstrap_has_exactly_one_active_settings_record() {
        let svc = service();
        let active = svc.get_active_settings().await;
        assert!(active.is_active);
        assert_eq!(active.version, 1);
    }

    #[tokio::test]
    async fn activating_already_active_id_is_idempotent_no_event() {
        let svc = service();
        let mut rx = svc.events.subscribe();
        let active = svc.get_active_settings().await;
        svc.activate_settings(&active.id, "tester").await.unwrap();

        tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await.expect_err("no event should be emitted");
    }

    #[tokio::test]
    async fn update_with_new_version_bumps_version_without_activating() {
        let svc = service();
        let active = svc.get_active_settings().await;
        let mut draft = active.clone();
        draft.terminology.enabled = false;

        let updated = svc.update_settings(&active.id, draft, true, "tester").await.unwrap();
        assert_eq!(updated.version, 2);
        assert!(!updated.is_active);

        let still_active = svc.get_active_settings().await;
        assert_eq!(still_active.version, 1);
    }

    #[tokio::test]
    async fn activate_emits_both_events_and_deactivates_previous() {
        let svc = service();
        let mut rx = svc.events.subscribe();
        let active = svc.get_active_settings().await;
        let mut draft = active.clone();
        draft.strict_mode = true;
        let updated = svc.update_settings(&active.id, draft, true, "tester").await.unwrap();

        svc.activate_settings(&updated.id, "tester").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, SettingsEvent::SettingsActivated { .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, SettingsEvent::SettingsChanged { .. }));

        let active_now = svc.get_active_settings().await;
        assert_eq!(active_now.id, updated.id);
    }

    #[tokio::test]
    async fn apply_preset_activates_a_new_version_in_place() {
        let svc = service();
        let applied = svc.apply_preset("lenient", "tester").await.unwrap();
        assert!(!applied.terminology.enabled);
        assert!(applied.is_active);
    }

    #[tokio::test]
    async fn rollback_creates_new_version_pointing_at_old_content() {
        let svc = service();
        let v1 = svc.get_active_settings().await;
        let mut draft = v1.clone();
        draft.strict_mode = true;
        let v2 = svc.update_settings(&v1.id, draft, true, "tester").await.unwrap();
        svc.activate_settings(&v2.id, "tester").await.unwrap();

        let rolled_back = svc.rollback_to_version(&v1.lineage_id, 1, "tester").await.unwrap();
        assert_eq!(rolled_back.version, 3);
        assert!(!rolled_back.strict_mode);
        assert!(rolled_back.is_active);
    }

    #[tokio::test]
    async fn backup_round_trips_and_detects_tampering() {
        let svc = service();
        let backup = svc.create_manual_backup("pre-migration snapshot", "tester", vec!["migration".to_string()]).await;
        assert!(svc.verify_backup(&backup.id).await.unwrap());

        let restored = svc.restore_from_backup(&backup.id, RestoreOptions { activate: true }, "tester").await.unwrap();
        assert!(restored.is_active);
    }

    #[tokio::test]
    async fn validate_settings_flags_unknown_terminology_server() {
        let svc = service();
        let mut candidate = svc.get_active_settings().await;
        candidate.terminology_servers.push(fhirval_core::TerminologyServer {
            id: "unknown".to_string(),
            name: "Unknown".to_string(),
            url: "https://example.org".to_string(),
            fhir_versions: std::collections::HashSet::from(["r4".to_string()]),
            priority: 0,
            enabled: true,
            circuit_open: false,
            last_failure: None,
            consecutive_failures: 0,
        });
        let result = svc.validate_settings(&candidate).await;
        assert!(!result.is_valid);
    }

    #[tokio::test]
    async fn cleanup_retains_minimum_backups_even_when_old() {
        let svc = service();
        for i in 0..3 {
            svc.create_manual_backup(&format!("backup-{i}"), "tester", vec![]).await;
        }
        let removed = svc.cleanup_old_backups().await;
        assert_eq!(removed, 0);
        assert_eq!(svc.list_backups().await.len(), 3);
    }
}
