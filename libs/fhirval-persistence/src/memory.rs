//! In-memory `ResultStore`, used by tests and by the zero-configuration
//! (`DATABASE_URL` unset) profile.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fhirval_core::ValidationResult;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::ResultStore;

#[derive(Default)]
pub struct InMemoryResultStore {
    // keyed by (resourceId, settingsHash, resourceHash)
    by_fingerprint: Mutex<HashMap<(String, String, String), ValidationResult>>,
    // keyed by resourceId, holding the most recent write regardless of fingerprint
    latest_by_resource: Mutex<HashMap<String, ValidationResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn store(&self, result: &ValidationResult) -> Result<()> {
        let key = (result.resource_id.clone(), result.settings_hash.clone(), result.resource_hash.clone());
        self.by_fingerprint.lock().await.insert(key, result.clone());
        self.latest_by_resource.lock().await.insert(result.resource_id.clone(), result.clone());
        Ok(())
    }

    async fn lookup(
        &self,
        resource_id: &str,
        settings_hash: &str,
        resource_hash: &str,
    ) -> Result<Option<ValidationResult>> {
        let key = (resource_id.to_string(), settings_hash.to_string(), resource_hash.to_string());
        Ok(self.by_fingerprint.lock().await.get(&key).cloned())
    }

    async fn latest_for_resource(&self, resource_id: &str) -> Result<Option<ValidationResult>> {
        Ok(self.latest_by_resource.lock().await.get(resource_id).cloned())
    }

    async fn list_by_type(&self, resource_type: &str, limit: usize, offset: usize) -> Result<Vec<ValidationResult>> {
        let guard = self.latest_by_resource.lock().await;
        let mut matching: Vec<ValidationResult> =
            guard.values().filter(|r| r.resource_type == resource_type).cloned().collect();
        matching.sort_by(|a, b| b.validated_at.cmp(&a.validated_at));
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_total(&self) -> Result<u64> {
        Ok(self.latest_by_resource.lock().await.len() as u64)
    }

    async fn count_valid(&self) -> Result<u64> {
        Ok(self.latest_by_resource.lock().await.values().filter(|r| r.is_valid).count() as u64)
    }

    async fn all_latest(&self) -> Result<Vec<ValidationResult>> {
        Ok(self.latest_by_resource.lock().await.values().cloned().collect())
    }

    async fn cleanup_older_than(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut by_fp = self.by_fingerprint.lock().await;
        let before_count = by_fp.len();
        by_fp.retain(|_, r| r.validated_at >= before);
        let removed_fp = before_count - by_fp.len();

        let mut latest = self.latest_by_resource.lock().await;
        latest.retain(|_, r| r.validated_at >= before);

        Ok(removed_fp as u64)
    }

    async fn clear(&self) -> Result<()> {
        self.by_fingerprint.lock().await.clear();
        self.latest_by_resource.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhirval_core::ValidationResult;
    use std::collections::HashMap as StdHashMap;

    fn result(resource_id: &str, resource_type: &str, is_valid: bool) -> ValidationResult {
        let mut r = ValidationResult::assemble(
            resource_type.to_string(),
            resource_id.to_string(),
            "sh".to_string(),
            "rh".to_string(),
            StdHashMap::new(),
            &[],
        );
        r.is_valid = is_valid;
        r
    }

    #[tokio::test]
    async fn store_then_lookup_round_trips() {
        let store = InMemoryResultStore::new();
        let r = result("p1", "Patient", true);
        store.store(&r).await.unwrap();
        let found = store.lookup("p1", "sh", "rh").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().resource_id, "p1");
    }

    #[tokio::test]
    async fn lookup_miss_returns_none() {
        let store = InMemoryResultStore::new();
        assert!(store.lookup("missing", "sh", "rh").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_for_resource_tracks_most_recent_write() {
        let store = InMemoryResultStore::new();
        let mut first = result("p1", "Patient", false);
        first.resource_hash = "rh1".to_string();
        store.store(&first).await.unwrap();
        let mut second = result("p1", "Patient", true);
        second.resource_hash = "rh2".to_string();
        store.store(&second).await.unwrap();

        let latest = store.latest_for_resource("p1").await.unwrap().unwrap();
        assert!(latest.is_valid);
    }

    #[tokio::test]
    async fn count_valid_counts_only_latest_per_resource() {
        let store = InMemoryResultStore::new();
        store.store(&result("p1", "Patient", true)).await.unwrap();
        store.store(&result("p2", "Patient", false)).await.unwrap();
        assert_eq!(store.count_total().await.unwrap(), 2);
        assert_eq!(store.count_valid().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cleanup_removes_entries_older_than_cutoff() {
        let store = InMemoryResultStore::new();
        let mut old = result("p1", "Patient", true);
        old.validated_at = Utc::now() - chrono::Duration::days(30);
        store.by_fingerprint.lock().await.insert(("p1".into(), "sh".into(), "rh".into()), old.clone());
        store.latest_by_resource.lock().await.insert("p1".into(), old);

        let removed = store.cleanup_older_than(Utc::now() - chrono::Duration::days(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_total().await.unwrap(), 0);
    }
}
