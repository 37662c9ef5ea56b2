//! Bridges the queue's generic `ItemProcessor` seam (SS 4.10: "the queue
//! itself stays ignorant of validation semantics") to the pipeline. The
//! dispatcher (hosted by the `fhirval-worker` binary) calls this for every
//! dequeued item.

use std::sync::Arc;

use async_trait::async_trait;
use fhirval_context::FhirContext;
use fhirval_core::FhirVersion;
use fhirval_orchestrator::{Pipeline, PipelineRequest, PipelineResourceInput, SettingsProvider};
use fhirval_queue::{ItemContext, ItemProcessor};
use fhirval_validator::{BusinessRule, ReferenceResolver};
use serde::Deserialize;
use serde_json::Value;

pub struct PipelineItemProcessor {
    pipeline: Arc<Pipeline>,
    settings: Arc<dyn SettingsProvider>,
    context: Arc<dyn FhirContext>,
    resolver: Option<Arc<dyn ReferenceResolver>>,
    business_rules: Vec<BusinessRule>,
    fhir_version: FhirVersion,
    terminology_server_url: String,
}

impl PipelineItemProcessor {
    pub fn new(
        pipeline: Arc<Pipeline>,
        settings: Arc<dyn SettingsProvider>,
        context: Arc<dyn FhirContext>,
        business_rules: Vec<BusinessRule>,
        fhir_version: FhirVersion,
        terminology_server_url: String,
    ) -> Self {
        Self { pipeline, settings, context, resolver: None, business_rules, fhir_version, terminology_server_url }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequestBody {
    #[serde(default)]
    resources: Vec<ResourceInput>,
    #[serde(default)]
    force_revalidation: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceInput {
    resource_id: String,
    resource: Value,
}

/// Item types the queue may carry. `"validate"` is the only one the API
/// currently enqueues; the match arm is exhaustive so a new item type fails
/// loudly instead of silently no-op'ing.
const ITEM_TYPE_VALIDATE: &str = "validate";

#[async_trait]
impl ItemProcessor for PipelineItemProcessor {
    async fn process(&self, item_type: &str, request: &Value, context: &ItemContext) -> Result<Value, String> {
        if item_type != ITEM_TYPE_VALIDATE {
            return Err(format!("unknown queue item type: {item_type}"));
        }

        let body: ValidateRequestBody =
            serde_json::from_value(request.clone()).map_err(|e| format!("invalid validate request: {e}"))?;

        let settings = self.settings.snapshot();
        let resources = body
            .resources
            .into_iter()
            .map(|r| PipelineResourceInput { resource_id: r.resource_id, resource: r.resource })
            .collect();

        let outcome = self
            .pipeline
            .execute_pipeline(PipelineRequest {
                request_id: context.request_id.clone(),
                resources,
                settings: &settings,
                context: self.context.as_ref(),
                resolver: self.resolver.as_deref(),
                business_rules: &self.business_rules,
                fhir_version: self.fhir_version,
                terminology_server_url: self.terminology_server_url.clone(),
                force_revalidation: body.force_revalidation,
            })
            .await;

        serde_json::to_value(&outcome).map_err(|e| format!("failed to serialize pipeline outcome: {e}"))
    }
}
