//! §4.10 Bulk Orchestrator: a resumable, pausable, cancellable walk of an
//! entire FHIR server's resource inventory, feeding pages of resources to the
//! validation pipeline.
//!
//! `BulkState` (§3) is guarded by a single mutex; every reader takes a
//! snapshot rather than holding the lock (§5). The walk itself runs on a
//! dedicated background task spawned by `start`/`resume` — it never borrows
//! the caller's request lifetime.

use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use fhirval_context::FhirContext;
use fhirval_core::{FhirVersion, ValidationSettings};
use fhirval_validator::{BusinessRule, ReferenceResolver};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::events::{BulkEvent, EventBus};
use crate::fhir_client::FhirServerClient;
use crate::pipeline::{Pipeline, PipelineRequest, PipelineResourceInput};
use crate::progress::{ItemLifecycle, ProgressTracker};

/// Bounds how many error summaries `BulkState.errors` retains (§7: "the
/// aggregate errors list is bounded").
const MAX_TRACKED_ERRORS: usize = 200;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("a bulk validation run is already in progress")]
    AlreadyRunning,
    #[error("no bulk validation run is paused")]
    NotPaused,
    #[error("no bulk validation run is active")]
    NotRunning,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePoint {
    pub resource_type: String,
    pub offset: u64,
    pub processed: u64,
    pub valid: u64,
    pub error: u64,
    pub errors: Vec<String>,
    pub start_time: DateTime<Utc>,
}

/// §3 `BulkState`. `is_running`/`is_paused` are mutually exclusive; `resume`
/// is populated iff `is_paused`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkState {
    pub is_running: bool,
    pub is_paused: bool,
    pub should_stop: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub current_type: Option<String>,
    pub next_type: Option<String>,
    pub resume: Option<ResumePoint>,
    /// Sum of `count(type)` across every advertised resource type, taken once
    /// at the start of a run. `None` until the CapabilityStatement and counts
    /// have been fetched; preserved across pause/resume of the same run.
    pub total: Option<u64>,
    pub processed: u64,
    pub valid: u64,
    pub error: u64,
    pub errors: Vec<String>,
}

impl Default for BulkState {
    fn default() -> Self {
        Self {
            is_running: false,
            is_paused: false,
            should_stop: false,
            start_time: None,
            current_type: None,
            next_type: None,
            resume: None,
            total: None,
            processed: 0,
            valid: 0,
            error: 0,
            errors: Vec::new(),
        }
    }
}

/// Intent captured alongside the one-shot `should_stop` flag so the walk loop
/// knows, at its next safe boundary, whether the caller meant pause or stop.
#[derive(Debug, Clone, Copy)]
enum PendingSignal {
    Pause,
    Stop { clear_results: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct BulkOrchestratorConfig {
    pub batch_size: u32,
    /// §9 Open Question: the 50,000-resource-per-type skip threshold, exposed
    /// as configuration rather than hardcoded.
    pub type_skip_threshold: u64,
    /// §9 Open Question: the orchestrator's own "valid" classification
    /// threshold (score >= this), which is deliberately allowed to diverge
    /// from a `ValidationResult.is_valid` (errorCount == 0).
    pub valid_score_threshold: u8,
}

impl Default for BulkOrchestratorConfig {
    fn default() -> Self {
        Self { batch_size: 50, type_skip_threshold: 50_000, valid_score_threshold: 95 }
    }
}

/// Supplies the settings snapshot each pipeline batch runs under. Kept as a
/// trait (§9 "model as explicit dependencies") so tests can substitute a
/// fixed settings value without standing up the full Settings Service.
pub trait SettingsProvider: Send + Sync {
    fn snapshot(&self) -> ValidationSettings;
}

pub struct BulkOrchestrator {
    state: Mutex<BulkState>,
    pending_signal: StdMutex<Option<PendingSignal>>,
    fhir_client: Arc<dyn FhirServerClient>,
    pipeline: Arc<Pipeline>,
    settings: Arc<dyn SettingsProvider>,
    context: Arc<dyn FhirContext>,
    resolver: Option<Arc<dyn ReferenceResolver>>,
    business_rules: Vec<BusinessRule>,
    fhir_version: FhirVersion,
    terminology_server_url: String,
    progress: Arc<ProgressTracker>,
    events: Arc<EventBus<BulkEvent>>,
    config: BulkOrchestratorConfig,
}

impl BulkOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fhir_client: Arc<dyn FhirServerClient>,
        pipeline: Arc<Pipeline>,
        settings: Arc<dyn SettingsProvider>,
        context: Arc<dyn FhirContext>,
        resolver: Option<Arc<dyn ReferenceResolver>>,
        business_rules: Vec<BusinessRule>,
        fhir_version: FhirVersion,
        terminology_server_url: String,
        progress: Arc<ProgressTracker>,
        events: Arc<EventBus<BulkEvent>>,
        config: BulkOrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BulkState::default()),
            pending_signal: StdMutex::new(None),
            fhir_client,
            pipeline,
            settings,
            context,
            resolver,
            business_rules,
            fhir_version,
            terminology_server_url,
            progress,
            events,
            config,
        })
    }

    pub async fn snapshot(&self) -> BulkState {
        self.state.lock().await.clone()
    }

    /// `idle -> running`. Resets counters unless a previous run left a
    /// `resume` point the caller explicitly wants to continue via `resume()`
    /// instead.
    pub async fn start(self: &Arc<Self>, force_revalidation: bool) -> Result<(), BulkError> {
        let mut state = self.state.lock().await;
        if state.is_running || state.is_paused {
            return Err(BulkError::AlreadyRunning);
        }
        *state = BulkState { is_running: true, start_time: Some(Utc::now()), ..BulkState::default() };
        drop(state);
        *self.pending_signal.lock().unwrap() = None;

        let this = self.clone();
        tokio::spawn(async move { this.run_walk(None, force_revalidation).await });
        Ok(())
    }

    /// `running -> paused`: sets `should_stop`; the walk observes it at the
    /// next safe boundary and captures `resume` itself.
    pub async fn pause(&self) -> Result<(), BulkError> {
        let mut state = self.state.lock().await;
        if !state.is_running || state.is_paused {
            return Err(BulkError::NotRunning);
        }
        *self.pending_signal.lock().unwrap() = Some(PendingSignal::Pause);
        state.should_stop = true;
        Ok(())
    }

    /// `paused -> running`: reads `resume`, clears `should_stop`, and
    /// continues from `(type, offset)`.
    pub async fn resume(self: &Arc<Self>, force_revalidation: bool) -> Result<(), BulkError> {
        let mut state = self.state.lock().await;
        if !state.is_paused {
            return Err(BulkError::NotPaused);
        }
        let resume_point = state.resume.clone().expect("is_paused implies resume is set");
        state.is_paused = false;
        state.is_running = true;
        state.should_stop = false;
        drop(state);
        *self.pending_signal.lock().unwrap() = None;

        let this = self.clone();
        tokio::spawn(async move { this.run_walk(Some(resume_point), force_revalidation).await });
        Ok(())
    }

    /// `any -> idle`. Clears `resume`. Does not clear previously persisted
    /// validation results unless `clear_results` is set (§9 Open Question
    /// resolution).
    pub async fn stop(&self, clear_results: bool) -> Result<(), BulkError> {
        let mut state = self.state.lock().await;
        if state.is_paused {
            state.is_paused = false;
            state.is_running = false;
            state.should_stop = false;
            state.resume = None;
            if clear_results {
                state.processed = 0;
                state.valid = 0;
                state.error = 0;
                state.errors.clear();
            }
            let (processed, valid, error) = (state.processed, state.valid, state.error);
            drop(state);
            self.events.emit(BulkEvent::BulkStopped { processed, valid, error });
            return Ok(());
        }
        if !state.is_running {
            return Err(BulkError::NotRunning);
        }
        *self.pending_signal.lock().unwrap() = Some(PendingSignal::Stop { clear_results });
        state.should_stop = true;
        Ok(())
    }

    async fn run_walk(self: Arc<Self>, resume_from: Option<ResumePoint>, force_revalidation: bool) {
        let types = match self.fhir_client.resource_types().await {
            Ok(types) => types,
            Err(err) => {
                warn!(%err, "bulk run could not read CapabilityStatement; stopping");
                self.finish_idle().await;
                return;
            }
        };

        let start_index = resume_from
            .as_ref()
            .and_then(|rp| types.iter().position(|t| t == &rp.resource_type))
            .unwrap_or(0);
        let initial_offset = resume_from.as_ref().map(|rp| rp.offset).unwrap_or(0);

        if resume_from.is_none() {
            let mut total = 0u64;
            for resource_type in &types {
                if let Ok(count) = self.fhir_client.count(resource_type).await {
                    total += count;
                }
            }
            self.state.lock().await.total = Some(total);
        }

        for (idx, resource_type) in types.iter().enumerate().skip(start_index) {
            let boundary_offset = if idx == start_index { initial_offset } else { 0 };
            if self.observe_stop(resource_type, boundary_offset).await {
                return;
            }

            {
                let mut state = self.state.lock().await;
                state.current_type = Some(resource_type.clone());
                state.next_type = types.get(idx + 1).cloned();
            }

            let count = match self.fhir_client.count(resource_type).await {
                Ok(count) => count,
                Err(err) => {
                    warn!(%resource_type, %err, "could not count resource type; skipping");
                    continue;
                }
            };
            if count > self.config.type_skip_threshold {
                info!(%resource_type, count, threshold = self.config.type_skip_threshold, "skipping resource type above bulk policy threshold");
                continue;
            }

            let mut offset = if idx == start_index { initial_offset } else { 0 };
            loop {
                if self.observe_stop(resource_type, offset).await {
                    return;
                }

                let page = match self.fhir_client.search_page(resource_type, offset, self.config.batch_size).await {
                    Ok(page) => page,
                    Err(err) => {
                        warn!(%resource_type, offset, %err, "page fetch failed; moving to next type");
                        break;
                    }
                };
                if page.resources.is_empty() {
                    break;
                }

                self.validate_page(resource_type, &page.resources, force_revalidation).await;

                offset += page.resources.len() as u64;
                if let Some(total) = page.total {
                    if offset >= total {
                        break;
                    }
                }
            }
        }

        self.finish_completed().await;
    }

    async fn validate_page(
        &self,
        resource_type: &str,
        resources: &[(String, serde_json::Value)],
        force_revalidation: bool,
    ) {
        let settings = self.settings.snapshot();
        let inputs = resources
            .iter()
            .map(|(id, data)| PipelineResourceInput { resource_id: id.clone(), resource: data.clone() })
            .collect();
        let request = PipelineRequest {
            request_id: format!("bulk-{resource_type}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()),
            resources: inputs,
            settings: &settings,
            context: self.context.as_ref(),
            resolver: self.resolver.as_deref(),
            business_rules: &self.business_rules,
            fhir_version: self.fhir_version,
            terminology_server_url: self.terminology_server_url.clone(),
            force_revalidation,
        };
        let outcome = self.pipeline.execute_pipeline(request).await;

        let mut state = self.state.lock().await;
        for result in &outcome.results {
            state.processed += 1;
            // §9: the orchestrator's own valid/error classification is
            // score-threshold based, distinct from `ValidationResult.is_valid`.
            let classified_valid = result.validation_score >= self.config.valid_score_threshold;
            if classified_valid {
                state.valid += 1;
            } else {
                state.error += 1;
                push_capped(
                    &mut state.errors,
                    format!("{}/{}: score {}", result.resource_type, result.resource_id, result.validation_score),
                    MAX_TRACKED_ERRORS,
                );
            }
            self.progress.record_item(ItemLifecycle::Completed, classified_valid, 0);
        }
        let (processed, valid, error) = (state.processed, state.valid, state.error);
        drop(state);

        self.events.emit(BulkEvent::BulkProgress {
            resource_type: resource_type.to_string(),
            offset: 0,
            processed,
            valid,
            error,
        });
    }

    /// Checks the one-shot `should_stop` signal at a safe boundary (§4.10,
    /// §5); consumes it and transitions to `paused` or `idle` as intended.
    /// Returns `true` if the walk must return now.
    async fn observe_stop(&self, resource_type: &str, offset: u64) -> bool {
        let should_stop = self.state.lock().await.should_stop;
        if !should_stop {
            return false;
        }
        let intent = self.pending_signal.lock().unwrap().take();
        match intent {
            Some(PendingSignal::Stop { clear_results }) => {
                let mut state = self.state.lock().await;
                state.is_running = false;
                state.is_paused = false;
                state.should_stop = false;
                state.resume = None;
                if clear_results {
                    state.processed = 0;
                    state.valid = 0;
                    state.error = 0;
                    state.errors.clear();
                }
                let (processed, valid, error) = (state.processed, state.valid, state.error);
                drop(state);
                self.events.emit(BulkEvent::BulkStopped { processed, valid, error });
                true
            }
            // Defaults to pause semantics: a should_stop flag without a
            // recorded intent only ever originates from `pause()`.
            _ => {
                let mut state = self.state.lock().await;
                state.is_running = false;
                state.is_paused = true;
                state.should_stop = false;
                state.resume = Some(ResumePoint {
                    resource_type: resource_type.to_string(),
                    offset,
                    processed: state.processed,
                    valid: state.valid,
                    error: state.error,
                    errors: state.errors.clone(),
                    start_time: state.start_time.unwrap_or_else(Utc::now),
                });
                let rt = resource_type.to_string();
                drop(state);
                self.events.emit(BulkEvent::BulkPaused { resource_type: rt, offset });
                true
            }
        }
    }

    async fn finish_completed(&self) {
        let mut state = self.state.lock().await;
        state.is_running = false;
        state.is_paused = false;
        state.resume = None;
        state.current_type = None;
        state.next_type = None;
        let (processed, valid, error) = (state.processed, state.valid, state.error);
        drop(state);
        *self.pending_signal.lock().unwrap() = None;
        self.events.emit(BulkEvent::BulkCompleted { processed, valid, error });
    }

    async fn finish_idle(&self) {
        let mut state = self.state.lock().await;
        state.is_running = false;
        state.is_paused = false;
        drop(state);
        *self.pending_signal.lock().unwrap() = None;
    }
}

fn push_capped(list: &mut Vec<String>, item: String, cap: usize) {
    if list.len() >= cap {
        list.remove(0);
    }
    list.push(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PipelineEvent;
    use crate::fhir_client::{FhirClientError, ResourcePage};
    use crate::fingerprint::InMemoryFingerprintCache;
    use async_trait::async_trait;
    use fhirval_context::StaticFhirContext;
    use fhirval_terminology::{BatchCodeValidator, TerminologyCache, TerminologyClient};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    struct FixedSettings(ValidationSettings);
    impl SettingsProvider for FixedSettings {
        fn snapshot(&self) -> ValidationSettings {
            self.0.clone()
        }
    }

    /// Serves two resource types, `A` with 100 resources and `B` with 200,
    /// paged deterministically so pause/resume can be tested precisely.
    struct FakeFhirServer {
        counts: std::collections::HashMap<String, u64>,
        pages_served: AtomicU64,
    }

    #[async_trait]
    impl FhirServerClient for FakeFhirServer {
        async fn resource_types(&self) -> crate::fhir_client::Result<Vec<String>> {
            Ok(vec!["A".to_string(), "B".to_string()])
        }

        async fn count(&self, resource_type: &str) -> crate::fhir_client::Result<u64> {
            Ok(*self.counts.get(resource_type).unwrap_or(&0))
        }

        async fn search_page(&self, resource_type: &str, offset: u64, count: u32) -> crate::fhir_client::Result<ResourcePage> {
            self.pages_served.fetch_add(1, Ordering::SeqCst);
            let total = *self.counts.get(resource_type).unwrap_or(&0);
            if offset >= total {
                return Ok(ResourcePage { resources: Vec::new(), total: Some(total) });
            }
            let end = (offset + count as u64).min(total);
            let resources = (offset..end)
                .map(|i| (format!("{resource_type}-{i}"), json!({"resourceType": resource_type, "id": format!("{resource_type}-{i}")})))
                .collect();
            Ok(ResourcePage { resources, total: Some(total) })
        }

        async fn read(&self, resource_type: &str, id: &str) -> crate::fhir_client::Result<serde_json::Value> {
            Ok(json!({"resourceType": resource_type, "id": id}))
        }
    }

    fn orchestrator(batch_size: u32) -> (Arc<BulkOrchestrator>, Arc<EventBus<BulkEvent>>) {
        let client = Arc::new(TerminologyClient::new(Duration::from_secs(1), Duration::from_secs(1)));
        let cache = Arc::new(TerminologyCache::new(1000, Duration::from_secs(60)));
        let terminology = Arc::new(BatchCodeValidator::new(client, cache));
        let fingerprint = Arc::new(InMemoryFingerprintCache::new());
        let pipeline_events = Arc::new(EventBus::<PipelineEvent>::new(16));
        let pipeline = Arc::new(Pipeline::new(fingerprint, terminology, pipeline_events));

        let fhir_client: Arc<dyn FhirServerClient> = Arc::new(FakeFhirServer {
            counts: std::collections::HashMap::from([("A".to_string(), 100), ("B".to_string(), 200)]),
            pages_served: AtomicU64::new(0),
        });
        let settings: Arc<dyn SettingsProvider> = Arc::new(FixedSettings(ValidationSettings::default_settings("tester")));
        let context: Arc<dyn FhirContext> = Arc::new(StaticFhirContext::default());
        let progress = Arc::new(ProgressTracker::new());
        let events = Arc::new(EventBus::<BulkEvent>::new(64));

        let config = BulkOrchestratorConfig { batch_size, ..BulkOrchestratorConfig::default() };
        let orch = BulkOrchestrator::new(
            fhir_client,
            pipeline,
            settings,
            context,
            None,
            Vec::new(),
            FhirVersion::R4,
            "http://unreachable.invalid".to_string(),
            progress,
            events.clone(),
            config,
        );
        (orch, events)
    }

    async fn wait_for<F: Fn(&BulkState) -> bool>(orch: &Arc<BulkOrchestrator>, predicate: F) -> BulkState {
        for _ in 0..500 {
            let snapshot = orch.snapshot().await;
            if predicate(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn start_twice_is_a_conflict() {
        let (orch, _events) = orchestrator(20);
        orch.start(false).await.unwrap();
        assert!(matches!(orch.start(false).await, Err(BulkError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn full_walk_processes_every_resource_exactly_once() {
        let (orch, _events) = orchestrator(25);
        orch.start(false).await.unwrap();
        let final_state = wait_for(&orch, |s| !s.is_running && !s.is_paused && s.processed > 0).await;
        assert_eq!(final_state.processed, 300);
        assert_eq!(final_state.valid + final_state.error, 300);
    }

    #[tokio::test]
    async fn pause_then_resume_reaches_total_exactly_once() {
        let (orch, _events) = orchestrator(20);
        orch.start(false).await.unwrap();

        // Let a handful of pages land, then request a pause.
        let _ = wait_for(&orch, |s| s.processed >= 60).await;
        orch.pause().await.unwrap();
        let paused = wait_for(&orch, |s| s.is_paused).await;
        assert!(paused.resume.is_some());
        let processed_at_pause = paused.processed;

        orch.resume(false).await.unwrap();
        let final_state = wait_for(&orch, |s| !s.is_running && !s.is_paused && s.processed >= 300).await;
        assert_eq!(final_state.processed, 300);
        assert!(processed_at_pause < 300);
    }

    #[tokio::test]
    async fn stop_without_clear_preserves_counters() {
        let (orch, events) = orchestrator(20);
        let mut rx = events.subscribe();
        orch.start(false).await.unwrap();
        let _ = wait_for(&orch, |s| s.processed >= 20).await;
        orch.stop(false).await.unwrap();

        loop {
            match rx.recv().await.unwrap() {
                BulkEvent::BulkStopped { processed, .. } => {
                    assert!(processed >= 20);
                    break;
                }
                _ => continue,
            }
        }
        let state = orch.snapshot().await;
        assert!(!state.is_running);
        assert!(!state.is_paused);
    }

    #[tokio::test]
    async fn stop_when_idle_is_rejected() {
        let (orch, _events) = orchestrator(20);
        assert!(matches!(orch.stop(false).await, Err(BulkError::NotRunning)));
    }
}
