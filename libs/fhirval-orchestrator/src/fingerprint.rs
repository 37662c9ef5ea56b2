//! §4.8 Result Fingerprint Cache: a thin abstraction over persistence so the
//! pipeline never depends on a storage engine directly.

use async_trait::async_trait;
use fhirval_core::ValidationResult;

#[async_trait]
pub trait FingerprintCache: Send + Sync {
    async fn lookup(
        &self,
        resource_id: &str,
        settings_hash: &str,
        resource_hash: &str,
    ) -> Option<ValidationResult>;

    async fn store(&self, result: &ValidationResult);
}

/// In-memory cache used by tests and by callers that don't need durability.
#[derive(Default)]
pub struct InMemoryFingerprintCache {
    inner: tokio::sync::Mutex<std::collections::HashMap<String, ValidationResult>>,
}

impl InMemoryFingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(resource_id: &str, settings_hash: &str, resource_hash: &str) -> String {
        format!("{resource_id}|{settings_hash}|{resource_hash}")
    }
}

#[async_trait]
impl FingerprintCache for InMemoryFingerprintCache {
    async fn lookup(&self, resource_id: &str, settings_hash: &str, resource_hash: &str) -> Option<ValidationResult> {
        let key = Self::key(resource_id, settings_hash, resource_hash);
        self.inner.lock().await.get(&key).cloned()
    }

    async fn store(&self, result: &ValidationResult) {
        let key = Self::key(&result.resource_id, &result.settings_hash, &result.resource_hash);
        self.inner.lock().await.insert(key, result.clone());
    }
}
