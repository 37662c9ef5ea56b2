//! SS 4.8 Result Fingerprint Cache, backed by durable storage: `validation_result`
//! indexed on `(resourceId, settingsHash, resourceHash)` and on `validatedAt` for
//! age-based cleanup (SS 6 "Persisted state layout").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fhirval_core::ValidationResult;
use fhirval_orchestrator::FingerprintCache;
use std::sync::Arc;

use crate::error::Result;

/// The API read path's storage contract: everything the HTTP handlers need
/// beyond the fingerprint lookup the pipeline uses internally.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn store(&self, result: &ValidationResult) -> Result<()>;

    async fn lookup(
        &self,
        resource_id: &str,
        settings_hash: &str,
        resource_hash: &str,
    ) -> Result<Option<ValidationResult>>;

    /// Most-recent result for a resource regardless of fingerprint match, used
    /// by the API read path when displaying history (SS 4.8).
    async fn latest_for_resource(&self, resource_id: &str) -> Result<Option<ValidationResult>>;

    async fn list_by_type(&self, resource_type: &str, limit: usize, offset: usize) -> Result<Vec<ValidationResult>>;

    async fn count_total(&self) -> Result<u64>;

    async fn count_valid(&self) -> Result<u64>;

    /// Every resource's most recent result, for callers (the Dashboard
    /// Aggregator) that need to re-project against a settings snapshot other
    /// than the one each result was originally validated under (SS 4.13,
    /// SS 9 "Result filtering at read time").
    async fn all_latest(&self) -> Result<Vec<ValidationResult>>;

    /// Deletes results older than `before`, returning the number removed.
    /// Superseded entries are pruned by age per SS 3 ("never mutated in
    /// place; superseded entries are pruned by age or on full clear").
    async fn cleanup_older_than(&self, before: DateTime<Utc>) -> Result<u64>;

    async fn clear(&self) -> Result<()>;
}

/// Adapts any `ResultStore` into the `FingerprintCache` trait the pipeline
/// depends on, without making `fhirval-orchestrator` aware of a storage engine
/// (SS 4.8: "a thin abstraction over persistence").
pub struct FingerprintCacheAdapter<S: ResultStore> {
    store: Arc<S>,
}

impl<S: ResultStore> FingerprintCacheAdapter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ResultStore> FingerprintCache for FingerprintCacheAdapter<S> {
    async fn lookup(&self, resource_id: &str, settings_hash: &str, resource_hash: &str) -> Option<ValidationResult> {
        match self.store.lookup(resource_id, settings_hash, resource_hash).await {
            Ok(found) => found,
            Err(err) => {
                tracing::error!(%err, "fingerprint lookup failed; treating as a cache miss");
                None
            }
        }
    }

    async fn store(&self, result: &ValidationResult) {
        if let Err(err) = self.store.store(result).await {
            tracing::error!(%err, resource_id = %result.resource_id, "failed to persist validation result");
        }
    }
}
