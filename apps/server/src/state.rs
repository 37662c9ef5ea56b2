//! Wires the library crates into the shared `AppState` the HTTP handlers and
//! the worker binary both hold. One `AppState::new` call is the entire
//! composition root (SS 9 "model as explicit dependencies rather than a
//! singleton" — everything here is an `Arc`, never a `static`).

use std::sync::Arc;

use anyhow::Context as _;
use fhirval_context::{FhirContext, StaticFhirContext};
use fhirval_core::{FhirVersion, ValidationSettings};
use fhirval_dashboard::{ActiveSettingsProvider, DashboardAggregator, DashboardConfig};
use fhirval_orchestrator::{
    BulkOrchestrator, BulkOrchestratorConfig, EventBus as OrchestratorEventBus, FhirServerClient, FingerprintCache,
    PipelineEvent, ReqwestFhirServerClient, Pipeline, BulkEvent, SettingsProvider as BulkSettingsProvider,
};
use fhirval_persistence::{FingerprintCacheAdapter, InMemoryResultStore, PostgresResultStore, ResultStore};
use fhirval_queue::{Dispatcher, DispatcherConfig, ValidationQueue};
use fhirval_settings::{EventBus as SettingsEventBus, SettingsEvent, SettingsService};
use fhirval_terminology::{BatchCodeValidator, TerminologyCache, TerminologyClient};
pub use fhirval_terminology::ServerHealth;
use fhirval_validator::BusinessRule;
use tokio::sync::{watch, Mutex};
use tracing::info;

use crate::config::Config;
use crate::processor::PipelineItemProcessor;

/// Bridges the settings service's async, event-sourced store to the two
/// library traits (`fhirval_orchestrator::SettingsProvider`,
/// `fhirval_dashboard::ActiveSettingsProvider`) that need a synchronous
/// snapshot on every pipeline/dashboard run. A background task keeps the
/// `watch` channel current by subscribing to `SettingsEvent` (SS 4.12).
struct WatchedSettings {
    rx: watch::Receiver<ValidationSettings>,
}

impl BulkSettingsProvider for WatchedSettings {
    fn snapshot(&self) -> ValidationSettings {
        self.rx.borrow().clone()
    }
}

impl ActiveSettingsProvider for WatchedSettings {
    fn snapshot(&self) -> ValidationSettings {
        self.rx.borrow().clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings_service: Arc<SettingsService>,
    pub settings_events: Arc<SettingsEventBus>,
    pub queue: Arc<ValidationQueue>,
    pub pipeline: Arc<Pipeline>,
    pub pipeline_events: Arc<OrchestratorEventBus<PipelineEvent>>,
    pub bulk: Arc<BulkOrchestrator>,
    pub bulk_events: Arc<OrchestratorEventBus<BulkEvent>>,
    pub dashboard: Arc<DashboardAggregator>,
    pub store: Arc<dyn ResultStore>,
    pub fhir_client: Arc<dyn FhirServerClient>,
    pub context: Arc<dyn FhirContext>,
    pub processor: Arc<PipelineItemProcessor>,
    pub terminology_client: Arc<TerminologyClient>,
    /// Only set while an in-process dispatcher (as opposed to the dedicated
    /// `fhirval-worker` binary) is draining the queue. `queue/start` and
    /// `queue/stop` toggle it; the `fhirval-worker` binary never touches it.
    dispatcher_shutdown: Arc<Mutex<Option<watch::Sender<bool>>>>,
    max_concurrent_validations: usize,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store: Arc<dyn ResultStore> = match &config.persistence.database_url {
            Some(url) => {
                info!("connecting to postgres result store");
                let pg = PostgresResultStore::connect(url).await.context("connecting to DATABASE_URL")?;
                pg.ensure_schema().await.context("ensuring validation_result schema")?;
                Arc::new(pg)
            }
            None => {
                info!("no DATABASE_URL set, using in-memory result store");
                Arc::new(InMemoryResultStore::new())
            }
        };

        let fingerprint_cache: Arc<dyn FingerprintCache> = Arc::new(FingerprintCacheAdapter::new(store.clone()));

        let terminology_client = Arc::new(TerminologyClient::new(
            config.validation.terminology_request_timeout(),
            config.validation.terminology_health_timeout(),
        ));
        let terminology_cache = Arc::new(TerminologyCache::new(
            config.validation.terminology_cache_max_entries,
            config.validation.terminology_cache_ttl(),
        ));
        let terminology = Arc::new(BatchCodeValidator::new(terminology_client.clone(), terminology_cache));

        let settings_events = Arc::new(SettingsEventBus::default());
        let settings_service = Arc::new(SettingsService::new("system", settings_events.clone()));

        let initial_settings = settings_service.get_active_settings().await;
        let (settings_tx, settings_rx) = watch::channel(initial_settings);
        let watched_settings = Arc::new(WatchedSettings { rx: settings_rx });
        spawn_settings_watch(settings_events.clone(), settings_tx);

        let context: Arc<dyn FhirContext> = Arc::new(StaticFhirContext::new());
        let business_rules: Vec<BusinessRule> = Vec::new();

        let fhir_client: Arc<dyn FhirServerClient> = Arc::new(ReqwestFhirServerClient::new(
            config.validation.fhir_server_base_url.clone(),
            config.validation.fhir_server_timeout(),
        ));

        let pipeline_events = Arc::new(OrchestratorEventBus::<PipelineEvent>::new(256));
        let pipeline = Arc::new(Pipeline::new(fingerprint_cache, terminology, pipeline_events.clone()));

        let bulk_events = Arc::new(OrchestratorEventBus::<BulkEvent>::new(256));
        let bulk = BulkOrchestrator::new(
            fhir_client.clone(),
            pipeline.clone(),
            watched_settings.clone() as Arc<dyn BulkSettingsProvider>,
            context.clone(),
            None,
            business_rules.clone(),
            FhirVersion::R4,
            config.validation.terminology_default_base.clone(),
            Arc::new(fhirval_orchestrator::ProgressTracker::new()),
            bulk_events.clone(),
            BulkOrchestratorConfig {
                batch_size: config.validation.bulk_batch_size,
                type_skip_threshold: config.validation.bulk_type_skip_threshold,
                valid_score_threshold: config.validation.bulk_valid_score_threshold,
            },
        );

        let dashboard = Arc::new(DashboardAggregator::new(
            fhir_client.clone(),
            store.clone(),
            watched_settings.clone() as Arc<dyn ActiveSettingsProvider>,
            DashboardConfig {
                cache_ttl: config.validation.dashboard_cache_ttl(),
                ..DashboardConfig::default()
            },
        ));

        let queue = Arc::new(ValidationQueue::new(
            config.validation.queue_max_size,
            config.validation.queue_default_max_attempts,
        ));

        let processor = Arc::new(PipelineItemProcessor::new(
            pipeline.clone(),
            watched_settings as Arc<dyn BulkSettingsProvider>,
            context.clone(),
            business_rules,
            FhirVersion::R4,
            config.validation.terminology_default_base.clone(),
        ));

        spawn_dashboard_invalidation(settings_events.clone(), dashboard.clone());
        let config_validation_max_concurrent = config.validation.max_concurrent_validations;

        Ok(Self {
            config,
            settings_service,
            settings_events,
            queue,
            pipeline,
            pipeline_events,
            bulk,
            bulk_events,
            dashboard,
            store,
            fhir_client,
            context,
            processor,
            terminology_client,
            dispatcher_shutdown: Arc::new(Mutex::new(None)),
            max_concurrent_validations: config_validation_max_concurrent,
        })
    }

    /// `POST /api/validation/queue/start`: idempotent. Spawns an in-process
    /// dispatcher if one is not already draining the queue.
    pub async fn start_dispatcher(&self) {
        let mut guard = self.dispatcher_shutdown.lock().await;
        if guard.is_some() {
            return;
        }
        let dispatcher = Dispatcher::new(
            self.queue.clone(),
            self.processor.clone(),
            DispatcherConfig { max_concurrent_validations: self.max_concurrent_validations, ..DispatcherConfig::default() },
        );
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move { dispatcher.run(rx).await });
        *guard = Some(tx);
    }

    /// `POST /api/validation/queue/stop`: idempotent. Signals the in-process
    /// dispatcher to finish its current in-flight items and return.
    pub async fn stop_dispatcher(&self) {
        if let Some(tx) = self.dispatcher_shutdown.lock().await.take() {
            let _ = tx.send(true);
        }
    }

    pub async fn is_dispatcher_running(&self) -> bool {
        self.dispatcher_shutdown.lock().await.is_some()
    }
}

/// §4.12: "settings changes invalidate the cache" for the dashboard's TTL
/// cache, independent of the `WatchedSettings` channel that feeds the
/// pipeline/bulk/dashboard settings snapshot itself.
fn spawn_dashboard_invalidation(events: Arc<SettingsEventBus>, dashboard: Arc<DashboardAggregator>) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(_) => dashboard.invalidate().await,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn spawn_settings_watch(events: Arc<SettingsEventBus>, tx: watch::Sender<ValidationSettings>) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SettingsEvent::SettingsActivated { content, .. }) | Ok(SettingsEvent::SettingsChanged { content, .. }) => {
                    let _ = tx.send(content);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
