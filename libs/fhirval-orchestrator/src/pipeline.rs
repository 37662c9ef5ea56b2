//! §4.7 Validation Pipeline: runs the six aspect evaluators under one settings
//! snapshot, consults the fingerprint cache, and assembles `ValidationResult`s.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use fhirval_context::FhirContext;
use fhirval_core::{
    resource_hash, Aspect, FhirVersion, Issue, IssueCode, ValidationMode, ValidationResult, ValidationSettings,
};
use fhirval_terminology::{BatchCodeValidator, BatchValidationResult};
use fhirval_validator::{
    clamp_severity, evaluate_business_rules, evaluate_metadata, evaluate_profiles, evaluate_references,
    evaluate_structural, missing_resource_type, BusinessRule, ReferenceResolver,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::cancellation::CancellationRegistry;
use crate::events::{EventBus, PipelineEvent};
use crate::fingerprint::FingerprintCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

pub struct PipelineResourceInput {
    pub resource_id: String,
    pub resource: Value,
}

pub struct PipelineRequest<'a> {
    pub request_id: String,
    pub resources: Vec<PipelineResourceInput>,
    pub settings: &'a ValidationSettings,
    pub context: &'a dyn FhirContext,
    pub resolver: Option<&'a dyn ReferenceResolver>,
    pub business_rules: &'a [BusinessRule],
    pub fhir_version: FhirVersion,
    pub terminology_server_url: String,
    pub force_revalidation: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub request_id: String,
    pub total: usize,
    pub processed: usize,
    pub valid: usize,
    pub invalid: usize,
    pub cancelled: bool,
    pub started_at: chrono::DateTime<Utc>,
    pub finished_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub summary: PipelineSummary,
    pub results: Vec<ValidationResult>,
}

pub struct Pipeline {
    fingerprint_cache: Arc<dyn FingerprintCache>,
    terminology: Arc<BatchCodeValidator>,
    events: Arc<EventBus<PipelineEvent>>,
    cancellations: Arc<CancellationRegistry>,
    statuses: Mutex<HashMap<String, PipelineStatus>>,
}

impl Pipeline {
    pub fn new(
        fingerprint_cache: Arc<dyn FingerprintCache>,
        terminology: Arc<BatchCodeValidator>,
        events: Arc<EventBus<PipelineEvent>>,
    ) -> Self {
        Self { fingerprint_cache, terminology, events, cancellations: Arc::new(CancellationRegistry::new()), statuses: Mutex::new(HashMap::new()) }
    }

    pub async fn get_pipeline_status(&self, request_id: &str) -> Option<PipelineStatus> {
        self.statuses.lock().await.get(request_id).copied()
    }

    /// Marks the request cancelled; the running loop observes it at the next
    /// per-resource boundary (§5).
    pub fn cancel_pipeline(&self, request_id: &str) -> bool {
        self.cancellations.cancel(request_id)
    }

    pub async fn execute_pipeline(&self, request: PipelineRequest<'_>) -> PipelineOutcome {
        let started_at = Utc::now();
        let request_id = request.request_id.clone();
        let cancel_flag = self.cancellations.register(&request_id);
        self.statuses.lock().await.insert(request_id.clone(), PipelineStatus::Running);

        let settings_hash = request.settings.content_hash();
        let enabled = request.settings.enabled_aspects();
        let total = request.resources.len();
        let mut results = Vec::with_capacity(total);
        let mut processed = 0usize;
        let mut valid = 0usize;
        let mut cancelled = false;

        for resource_input in request.resources {
            // Yield at the per-resource boundary so a concurrent cancel_pipeline()
            // call is observed promptly even on a single-threaded runtime (§5).
            tokio::task::yield_now().await;
            if cancel_flag.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            let result = self
                .validate_one(
                    &resource_input.resource_id,
                    &resource_input.resource,
                    &settings_hash,
                    &enabled,
                    &request,
                )
                .await;

            if result.is_valid {
                valid += 1;
            }
            processed += 1;
            results.push(result);

            self.events.emit(PipelineEvent::PipelineProgress { request_id: request_id.clone(), processed, total });
        }

        let finished_at = Utc::now();
        let invalid = processed.saturating_sub(valid);

        let status = if cancelled { PipelineStatus::Cancelled } else { PipelineStatus::Completed };
        self.statuses.lock().await.insert(request_id.clone(), status);
        self.cancellations.unregister(&request_id);

        if cancelled {
            self.events.emit(PipelineEvent::PipelineCancelled { request_id: request_id.clone(), processed });
        } else {
            self.events.emit(PipelineEvent::PipelineCompleted {
                request_id: request_id.clone(),
                processed,
                valid,
                error: invalid,
            });
        }

        info!(request_id = %request_id, total, processed, valid, cancelled, "pipeline run finished");

        PipelineOutcome {
            summary: PipelineSummary { request_id, total, processed, valid, invalid, cancelled, started_at, finished_at },
            results,
        }
    }

    async fn validate_one(
        &self,
        resource_id: &str,
        resource: &Value,
        settings_hash: &str,
        enabled: &[Aspect],
        request: &PipelineRequest<'_>,
    ) -> ValidationResult {
        let resource_type = resource.get("resourceType").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let hash = resource_hash(resource);

        if !request.force_revalidation {
            if let Some(cached) = self.fingerprint_cache.lookup(resource_id, settings_hash, &hash).await {
                return cached;
            }
        }

        let settings = request.settings;

        if missing_resource_type(resource) {
            let mut per_aspect = HashMap::new();
            per_aspect.insert(Aspect::Structural, vec![structural_missing_type_issue()]);
            let result = ValidationResult::assemble(
                resource_type,
                resource_id.to_string(),
                settings_hash.to_string(),
                hash,
                per_aspect,
                &[Aspect::Structural],
            );
            self.fingerprint_cache.store(&result).await;
            return result;
        }

        let structural_fut = async {
            if settings.is_enabled(Aspect::Structural) {
                clamp_severity(evaluate_structural(resource, request.context), settings.structural.severity)
            } else {
                Vec::new()
            }
        };
        let profile_fut = async {
            if settings.is_enabled(Aspect::Profile) {
                clamp_severity(
                    evaluate_profiles(resource, request.context, &settings.profiles),
                    settings.profile.severity,
                )
            } else {
                Vec::new()
            }
        };
        let metadata_fut = async {
            if settings.is_enabled(Aspect::Metadata) {
                clamp_severity(evaluate_metadata(resource), settings.metadata.severity)
            } else {
                Vec::new()
            }
        };
        let reference_fut = async {
            if settings.is_enabled(Aspect::Reference) {
                clamp_severity(evaluate_references(resource, request.resolver), settings.reference.severity)
            } else {
                Vec::new()
            }
        };
        let business_rule_fut = async {
            if settings.is_enabled(Aspect::BusinessRule) {
                clamp_severity(
                    evaluate_business_rules(resource, request.business_rules),
                    settings.business_rule.severity,
                )
            } else {
                Vec::new()
            }
        };
        let terminology_fut = async {
            if settings.is_enabled(Aspect::Terminology) {
                let codes = fhirval_core::extract_codes(resource);
                if codes.is_empty() {
                    Vec::new()
                } else {
                    let batch = self
                        .terminology
                        .validate_batch(
                            &codes,
                            request.fhir_version.path_suffix(),
                            &request.terminology_server_url,
                            matches!(settings.mode, ValidationMode::Offline),
                            None,
                        )
                        .await;
                    clamp_severity(terminology_issues(&batch), settings.terminology.severity)
                }
            } else {
                Vec::new()
            }
        };

        let (structural, profile, metadata, reference, business_rule, terminology) =
            tokio::join!(structural_fut, profile_fut, metadata_fut, reference_fut, business_rule_fut, terminology_fut);

        let mut per_aspect = HashMap::new();
        per_aspect.insert(Aspect::Structural, structural);
        per_aspect.insert(Aspect::Profile, profile);
        per_aspect.insert(Aspect::Metadata, metadata);
        per_aspect.insert(Aspect::Reference, reference);
        per_aspect.insert(Aspect::BusinessRule, business_rule);
        per_aspect.insert(Aspect::Terminology, terminology);

        let result =
            ValidationResult::assemble(resource_type, resource_id.to_string(), settings_hash.to_string(), hash, per_aspect, enabled);
        self.fingerprint_cache.store(&result).await;
        result
    }
}

fn structural_missing_type_issue() -> Issue {
    Issue::error(IssueCode::Required, Aspect::Structural, "resource is missing a resourceType")
}

/// Turns a batch terminology result into issues: an invalid code is an error,
/// a graceful-degradation response is informational (§4.6).
fn terminology_issues(batch: &BatchValidationResult) -> Vec<Issue> {
    let mut issues = Vec::new();
    for (path, outcomes) in &batch.results {
        for (_key, outcome) in outcomes {
            if outcome.valid {
                if outcome.degraded {
                    issues.push(
                        Issue::information(IssueCode::Informational, Aspect::Terminology, "code system cannot be validated; accepted without verification")
                            .with_path(path.clone()),
                    );
                }
                continue;
            }
            let message = outcome.message.clone().unwrap_or_else(|| "code is not valid for the bound system/value set".to_string());
            issues.push(Issue::error(IssueCode::CodeInvalid, Aspect::Terminology, message).with_path(path.clone()));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::InMemoryFingerprintCache;
    use fhirval_context::StaticFhirContext;
    use fhirval_core::ValidationSettings;
    use fhirval_terminology::TerminologyCache;
    use fhirval_terminology::TerminologyClient;
    use serde_json::json;
    use std::time::Duration;

    fn pipeline() -> Pipeline {
        let client = Arc::new(TerminologyClient::new(Duration::from_secs(1), Duration::from_secs(1)));
        let cache = Arc::new(TerminologyCache::new(100, Duration::from_secs(60)));
        let terminology = Arc::new(BatchCodeValidator::new(client, cache));
        let fingerprint = Arc::new(InMemoryFingerprintCache::new());
        let events = Arc::new(EventBus::new(16));
        Pipeline::new(fingerprint, terminology, events)
    }

    #[tokio::test]
    async fn missing_resource_type_yields_only_structural_issue() {
        let pipeline = pipeline();
        let context = StaticFhirContext::default();
        let settings = ValidationSettings::default_settings("tester");
        let request = PipelineRequest {
            request_id: "req-1".to_string(),
            resources: vec![PipelineResourceInput { resource_id: "r1".to_string(), resource: json!({"id": "r1"}) }],
            settings: &settings,
            context: &context,
            resolver: None,
            business_rules: &[],
            fhir_version: FhirVersion::R4,
            terminology_server_url: "http://unreachable.invalid".to_string(),
            force_revalidation: false,
        };
        let outcome = pipeline.execute_pipeline(request).await;
        assert_eq!(outcome.results.len(), 1);
        assert!(!outcome.results[0].is_valid);
        assert_eq!(outcome.results[0].error_count, 1);
    }

    #[tokio::test]
    async fn valid_patient_passes_with_full_score() {
        let pipeline = pipeline();
        let context = StaticFhirContext::default();
        let settings = ValidationSettings::default_settings("tester");
        let resource = json!({"resourceType": "Patient", "id": "p1", "gender": "male"});
        let request = PipelineRequest {
            request_id: "req-2".to_string(),
            resources: vec![PipelineResourceInput { resource_id: "p1".to_string(), resource }],
            settings: &settings,
            context: &context,
            resolver: None,
            business_rules: &[],
            fhir_version: FhirVersion::R4,
            terminology_server_url: "http://unreachable.invalid".to_string(),
            force_revalidation: false,
        };
        let outcome = pipeline.execute_pipeline(request).await;
        assert!(outcome.results[0].is_valid);
    }

    #[tokio::test]
    async fn cached_result_is_returned_without_rerunning_evaluators() {
        let pipeline = pipeline();
        let context = StaticFhirContext::default();
        let settings = ValidationSettings::default_settings("tester");
        let resource = json!({"resourceType": "Patient", "id": "p1", "gender": "male"});

        let request1 = PipelineRequest {
            request_id: "req-3".to_string(),
            resources: vec![PipelineResourceInput { resource_id: "p1".to_string(), resource: resource.clone() }],
            settings: &settings,
            context: &context,
            resolver: None,
            business_rules: &[],
            fhir_version: FhirVersion::R4,
            terminology_server_url: "http://unreachable.invalid".to_string(),
            force_revalidation: false,
        };
        let first = pipeline.execute_pipeline(request1).await;

        let request2 = PipelineRequest {
            request_id: "req-4".to_string(),
            resources: vec![PipelineResourceInput { resource_id: "p1".to_string(), resource }],
            settings: &settings,
            context: &context,
            resolver: None,
            business_rules: &[],
            fhir_version: FhirVersion::R4,
            terminology_server_url: "http://unreachable.invalid".to_string(),
            force_revalidation: false,
        };
        let second = pipeline.execute_pipeline(request2).await;
        assert!(first.results[0].content_eq(&second.results[0]));
    }

    #[tokio::test]
    async fn external_system_code_yields_information_not_error() {
        let pipeline = pipeline();
        let context = StaticFhirContext::default();
        let settings = ValidationSettings::default_settings("tester");
        let resource = json!({
            "resourceType": "Patient",
            "id": "p3",
            "address": [{
                "country": {"coding": [{"system": "urn:iso:std:iso:3166", "code": "DE"}]}
            }]
        });
        let request = PipelineRequest {
            request_id: "req-ext".to_string(),
            resources: vec![PipelineResourceInput { resource_id: "p3".to_string(), resource }],
            settings: &settings,
            context: &context,
            resolver: None,
            business_rules: &[],
            fhir_version: FhirVersion::R4,
            terminology_server_url: "http://unreachable.invalid".to_string(),
            force_revalidation: false,
        };
        let outcome = pipeline.execute_pipeline(request).await;
        let result = &outcome.results[0];
        assert!(result.is_valid);
        let terminology = &result.aspect_breakdown[&Aspect::Terminology];
        assert_eq!(terminology.error_count, 0);
        assert_eq!(terminology.information_count, 1);
    }

    #[tokio::test]
    async fn cancel_pipeline_stops_before_remaining_resources() {
        let pipeline = Arc::new(pipeline());
        let context = Arc::new(StaticFhirContext::default());
        let settings = Arc::new(ValidationSettings::default_settings("tester"));
        let resources: Vec<_> = (0..200)
            .map(|i| PipelineResourceInput {
                resource_id: format!("p{i}"),
                resource: json!({"resourceType": "Patient", "id": format!("p{i}")}),
            })
            .collect();

        let run_pipeline = pipeline.clone();
        let run_context = context.clone();
        let run_settings = settings.clone();
        let handle = tokio::spawn(async move {
            let request = PipelineRequest {
                request_id: "req-5".to_string(),
                resources,
                settings: &run_settings,
                context: run_context.as_ref(),
                resolver: None,
                business_rules: &[],
                fhir_version: FhirVersion::R4,
                terminology_server_url: "http://unreachable.invalid".to_string(),
                force_revalidation: false,
            };
            run_pipeline.execute_pipeline(request).await
        });

        tokio::task::yield_now().await;
        pipeline.cancel_pipeline("req-5");
        let outcome = handle.await.unwrap();
        assert!(outcome.summary.cancelled);
        assert!(outcome.summary.processed < 200);
    }
}
