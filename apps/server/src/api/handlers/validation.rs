//! `POST /api/validation/validate|validate-batch|validate-by-ids` (§6): the
//! synchronous single- and multi-resource validation paths. The queue
//! (`handlers::queue`) is the asynchronous alternative for callers that want
//! to enqueue work and poll, not a prerequisite for these.

use axum::extract::State;
use axum::Json;
use fhirval_core::{resource_hash, ValidationResult};
use fhirval_orchestrator::{PipelineRequest, PipelineResourceInput};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub resource: Value,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub force_revalidation: bool,
}

fn resource_id_of(resource: &Value) -> String {
    resource
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// `POST /api/validation/validate` `{resource, profileUrl?, config?}` -> `ValidationResult`.
pub async fn validate(State(state): State<AppState>, Json(body): Json<ValidateRequest>) -> Result<Json<ValidationResult>> {
    if body.resource.get("resourceType").and_then(|v| v.as_str()).is_none() {
        return Err(Error::Input("resource is missing resourceType".to_string()));
    }

    let mut settings = state.settings_service.get_active_settings().await;
    if let Some(profile_url) = body.profile_url {
        if !settings.profiles.contains(&profile_url) {
            settings.profiles.push(profile_url);
        }
    }

    let resource_id = resource_id_of(&body.resource);
    let outcome = state
        .pipeline
        .execute_pipeline(PipelineRequest {
            request_id: Uuid::new_v4().to_string(),
            resources: vec![PipelineResourceInput { resource_id, resource: body.resource }],
            settings: &settings,
            context: state.context.as_ref(),
            resolver: None,
            business_rules: &[],
            fhir_version: fhirval_core::FhirVersion::R4,
            terminology_server_url: state.config.validation.terminology_default_base.clone(),
            force_revalidation: body.force_revalidation,
        })
        .await;

    outcome
        .results
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| Error::Other(anyhow::anyhow!("pipeline produced no result for single-resource request")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBatchRequest {
    pub resources: Vec<Value>,
    #[serde(default)]
    pub force_revalidation: bool,
}

/// `POST /api/validation/validate-batch` `{resources}` -> `list<ValidationResult>`.
pub async fn validate_batch(
    State(state): State<AppState>,
    Json(body): Json<ValidateBatchRequest>,
) -> Result<Json<Vec<ValidationResult>>> {
    let settings = state.settings_service.get_active_settings().await;
    let resources = body
        .resources
        .into_iter()
        .map(|resource| PipelineResourceInput { resource_id: resource_id_of(&resource), resource })
        .collect();

    let outcome = state
        .pipeline
        .execute_pipeline(PipelineRequest {
            request_id: Uuid::new_v4().to_string(),
            resources,
            settings: &settings,
            context: state.context.as_ref(),
            resolver: None,
            business_rules: &[],
            fhir_version: fhirval_core::FhirVersion::R4,
            terminology_server_url: state.config.validation.terminology_default_base.clone(),
            force_revalidation: body.force_revalidation,
        })
        .await;

    Ok(Json(outcome.results))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateByIdsRequest {
    /// `"ResourceType/id"` compound ids, e.g. `"Patient/123"`.
    pub resource_ids: Vec<String>,
    #[serde(default)]
    pub force_revalidation: bool,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateByIdsResponse {
    pub validated_count: usize,
    pub cached_count: usize,
    pub newly_validated_count: usize,
    pub results: Vec<ValidationResult>,
}

/// `POST /api/validation/validate-by-ids` `{resourceIds, forceRevalidation?}`.
/// Each id is read fresh from the FHIR server (§6 "read") before validation,
/// so a resource changed upstream since its last run is always re-fetched.
pub async fn validate_by_ids(
    State(state): State<AppState>,
    Json(body): Json<ValidateByIdsRequest>,
) -> Result<Json<ValidateByIdsResponse>> {
    let settings = state.settings_service.get_active_settings().await;
    let settings_hash = settings.content_hash();

    let mut inputs = Vec::with_capacity(body.resource_ids.len());
    let mut cached_count = 0usize;

    for compound_id in &body.resource_ids {
        let (resource_type, id) = compound_id
            .split_once('/')
            .ok_or_else(|| Error::Input(format!("resourceId '{compound_id}' is not of the form ResourceType/id")))?;

        let resource = state
            .fhir_client
            .read(resource_type, id)
            .await
            .map_err(|e| Error::DependencyUnavailable(e.to_string()))?;

        if !body.force_revalidation {
            let hash = resource_hash(&resource);
            if state.store.lookup(id, &settings_hash, &hash).await?.is_some() {
                cached_count += 1;
            }
        }

        inputs.push(PipelineResourceInput { resource_id: id.to_string(), resource });
    }

    let outcome = state
        .pipeline
        .execute_pipeline(PipelineRequest {
            request_id: Uuid::new_v4().to_string(),
            resources: inputs,
            settings: &settings,
            context: state.context.as_ref(),
            resolver: None,
            business_rules: &[],
            fhir_version: fhirval_core::FhirVersion::R4,
            terminology_server_url: state.config.validation.terminology_default_base.clone(),
            force_revalidation: body.force_revalidation,
        })
        .await;

    let validated_count = outcome.results.len();
    Ok(Json(ValidateByIdsResponse {
        validated_count,
        cached_count,
        newly_validated_count: validated_count.saturating_sub(cached_count),
        results: outcome.results,
    }))
}
