//! Observer events emitted by the pipeline and bulk orchestrator (§4.7, §4.10).

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PipelineEvent {
    PipelineProgress { request_id: String, processed: usize, total: usize },
    PipelineCompleted { request_id: String, processed: usize, valid: usize, error: usize },
    PipelineFailed { request_id: String, message: String },
    PipelineCancelled { request_id: String, processed: usize },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BulkEvent {
    BulkProgress { resource_type: String, offset: u64, processed: u64, valid: u64, error: u64 },
    BulkCompleted { processed: u64, valid: u64, error: u64 },
    BulkPaused { resource_type: String, offset: u64 },
    BulkStopped { processed: u64, valid: u64, error: u64 },
}

/// Thin wrapper over a broadcast channel; subscribers that lag simply miss
/// intermediate progress events, which is acceptable for observability traffic.
pub struct EventBus<E: Clone> {
    sender: tokio::sync::broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }
}
