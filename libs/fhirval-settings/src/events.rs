//! §4.12 lifecycle events. Consumers (the pipeline's settings snapshot, the
//! dashboard cache, and the API read path) subscribe and treat every event
//! as a cache-invalidation trigger.

use fhirval_core::ValidationSettings;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SettingsEvent {
    SettingsActivated { previous_version: Option<u32>, new_version: u32, content: ValidationSettings },
    SettingsChanged { previous_version: Option<u32>, new_version: u32, content: ValidationSettings },
}

/// Thin broadcast wrapper, same shape as the orchestrator's `EventBus` — kept
/// local rather than shared to avoid a cross-crate dependency for one type.
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<SettingsEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SettingsEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SettingsEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
