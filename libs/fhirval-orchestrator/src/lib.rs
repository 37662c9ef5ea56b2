//! The stateful core of the engine (§2 components 1-2, 8-9, §4.7-§4.11): the
//! six-aspect validation pipeline, the resumable bulk server walk, the
//! fingerprint cache that backs both, cooperative cancellation, the FHIR
//! server protocol surface the bulk walk consumes, and the progress tracker
//! both feed.

pub mod bulk;
pub mod cancellation;
pub mod events;
pub mod fhir_client;
pub mod fingerprint;
pub mod pipeline;
pub mod progress;

pub use bulk::{BulkError, BulkOrchestrator, BulkOrchestratorConfig, BulkState, ResumePoint, SettingsProvider};
pub use cancellation::CancellationRegistry;
pub use events::{BulkEvent, EventBus, PipelineEvent};
pub use fhir_client::{FhirClientError, FhirServerClient, ReqwestFhirServerClient, ResourcePage};
pub use fingerprint::{FingerprintCache, InMemoryFingerprintCache};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineRequest, PipelineResourceInput, PipelineStatus, PipelineSummary};
pub use progress::{ItemLifecycle, ProgressSnapshot, ProgressTracker};
