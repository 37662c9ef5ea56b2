//! `GET/PUT /api/validation/settings`, `POST
//! /api/validation/settings/reset|validate|test|presets/apply|rollback` (§6,
//! §4.12). `history`, `statistics`, `audit`, and `backups` are SPEC_FULL
//! supplements grounded in the Settings Service's own surface.

use axum::extract::{Query, State};
use axum::Json;
use fhirval_core::{SettingsValidation, ValidationSettings};
use fhirval_terminology::ServerHealth;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;

const ACTOR: &str = "api";

/// `GET /api/validation/settings` -> the currently active settings.
pub async fn get_active(State(state): State<AppState>) -> Json<ValidationSettings> {
    Json(state.settings_service.get_active_settings().await)
}

/// `PUT /api/validation/settings`: persists `body` as a new version of the
/// active lineage and activates it immediately (no separate activation step
/// is exposed on the wire surface).
pub async fn update_active(
    State(state): State<AppState>,
    Json(body): Json<ValidationSettings>,
) -> Result<Json<ValidationSettings>> {
    let active = state.settings_service.get_active_settings().await;
    let updated = state.settings_service.update_settings(&active.id, body, true, ACTOR).await?;
    let activated = state.settings_service.activate_settings(&updated.id, ACTOR).await?;
    Ok(Json(activated))
}

/// `POST /api/validation/settings/reset`: restores and activates the
/// out-of-the-box default settings as a fresh version of the active lineage.
pub async fn reset(State(state): State<AppState>) -> Result<Json<ValidationSettings>> {
    let active = state.settings_service.get_active_settings().await;
    let defaults = ValidationSettings::default_settings(ACTOR);
    let updated = state.settings_service.update_settings(&active.id, defaults, true, ACTOR).await?;
    let activated = state.settings_service.activate_settings(&updated.id, ACTOR).await?;
    Ok(Json(activated))
}

/// `POST /api/validation/settings/validate`: structural validity check of a
/// candidate settings document, without persisting it.
pub async fn validate(
    State(state): State<AppState>,
    Json(candidate): Json<ValidationSettings>,
) -> Json<SettingsValidation> {
    Json(state.settings_service.validate_settings(&candidate).await)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminologyServerTestResult {
    pub id: String,
    pub url: String,
    pub health: ServerHealth,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub results: Vec<TerminologyServerTestResult>,
}

/// `POST /api/validation/settings/test`: live connectivity check of every
/// terminology server declared on a candidate settings document, via the
/// same `TerminologyClient` the pipeline uses (§4.4 "direct terminology
/// client").
pub async fn test(
    State(state): State<AppState>,
    Json(candidate): Json<ValidationSettings>,
) -> Json<TestResponse> {
    let mut results = Vec::with_capacity(candidate.terminology_servers.len());
    for server in &candidate.terminology_servers {
        let health = state.terminology_client.check_server_health(&server.url, candidate_fhir_version(&candidate)).await;
        results.push(TerminologyServerTestResult { id: server.id.clone(), url: server.url.clone(), health });
    }
    Json(TestResponse { results })
}

fn candidate_fhir_version(_candidate: &ValidationSettings) -> fhirval_core::FhirVersion {
    fhirval_core::FhirVersion::R4
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPresetRequest {
    pub preset_id: String,
}

/// `POST /api/validation/settings/presets/apply`.
pub async fn apply_preset(
    State(state): State<AppState>,
    Json(body): Json<ApplyPresetRequest>,
) -> Result<Json<ValidationSettings>> {
    let applied = state.settings_service.apply_preset(&body.preset_id, ACTOR).await?;
    Ok(Json(applied))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    pub lineage_id: String,
    pub version: u32,
}

/// `POST /api/validation/settings/rollback`.
pub async fn rollback(
    State(state): State<AppState>,
    Json(body): Json<RollbackRequest>,
) -> Result<Json<ValidationSettings>> {
    let restored = state.settings_service.rollback_to_version(&body.lineage_id, body.version, ACTOR).await?;
    Ok(Json(restored))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    id: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    50
}

/// `GET /api/validation/settings/history?id=&limit=&offset=`.
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ValidationSettings>>> {
    let versions = state.settings_service.get_history(&query.id, query.limit, query.offset).await?;
    Ok(Json(versions))
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default)]
    include_details: bool,
}

/// `GET /api/validation/settings/statistics`.
pub async fn statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Json<fhirval_settings::StatisticsReport> {
    Json(state.settings_service.get_statistics(None, query.include_details).await)
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    settings_id: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

/// `GET /api/validation/settings/audit`.
pub async fn audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<fhirval_settings::AuditEntry>> {
    Json(state.settings_service.get_audit_trail(query.settings_id.as_deref(), query.limit).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupRequest {
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `POST /api/validation/settings/backups`.
pub async fn create_backup(
    State(state): State<AppState>,
    Json(body): Json<CreateBackupRequest>,
) -> Json<fhirval_settings::SettingsBackup> {
    Json(state.settings_service.create_manual_backup(&body.description, ACTOR, body.tags).await)
}

/// `GET /api/validation/settings/backups`.
pub async fn list_backups(State(state): State<AppState>) -> Json<Vec<fhirval_settings::SettingsBackup>> {
    Json(state.settings_service.list_backups().await)
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RestoreBackupRequest {
    #[serde(default)]
    pub activate: bool,
}

/// `POST /api/validation/settings/backups/:id/restore`.
pub async fn restore_backup(
    State(state): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<String>,
    Json(body): Json<RestoreBackupRequest>,
) -> Result<Json<ValidationSettings>> {
    let options = fhirval_settings::RestoreOptions { activate: body.activate };
    let restored = state.settings_service.restore_from_backup(&id, options, ACTOR).await?;
    Ok(Json(restored))
}

/// `DELETE /api/validation/settings/backups/:id`.
pub async fn delete_backup(
    State(state): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.settings_service.delete_backup(&id).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

#[derive(Debug, Serialize)]
pub struct VerifyBackupResponse {
    pub id: String,
    pub intact: bool,
}

/// `GET /api/validation/settings/backups/:id/verify`: recomputes the
/// backup's content hash and compares it against the hash captured at
/// backup time (§4.12 `verifyBackup`).
pub async fn verify_backup(
    State(state): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<Json<VerifyBackupResponse>> {
    let intact = state.settings_service.verify_backup(&id).await?;
    Ok(Json(VerifyBackupResponse { id, intact }))
}

#[derive(Debug, Serialize)]
pub struct CleanupBackupsResponse {
    pub removed: usize,
}

/// `POST /api/validation/settings/backups/cleanup`: prunes old automatic
/// backups per the Settings Service's retention policy (§4.12
/// `cleanupOldBackups`). Manual backups are never swept.
pub async fn cleanup_backups(State(state): State<AppState>) -> Json<CleanupBackupsResponse> {
    Json(CleanupBackupsResponse { removed: state.settings_service.cleanup_old_backups().await })
}
