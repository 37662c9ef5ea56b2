//! SS 4.13 Dashboard Aggregator: per-server resource counts, validation
//! coverage, success rate, and top-N breakdowns, all TTL-cached and
//! invalidated on settings changes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fhirval_core::ValidationSettings;
use fhirval_orchestrator::FhirServerClient;
use fhirval_persistence::ResultStore;
use serde::Serialize;

use crate::cache::TtlSlot;

#[derive(Debug, Clone, Copy)]
pub struct DashboardConfig {
    pub cache_ttl: Duration,
    /// How many resource types to count concurrently per batch (SS 4.13:
    /// "bounded-parallel batches with a small inter-batch delay").
    pub count_batch_size: usize,
    pub count_batch_delay: Duration,
    pub top_n: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            count_batch_size: 5,
            count_batch_delay: Duration::from_millis(50),
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeCount {
    pub resource_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    pub total_server_resources: u64,
    pub validated_resources: u64,
    pub coverage: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub server_counts: Vec<ResourceTypeCount>,
    pub total_server_resources: u64,
    pub coverage: CoverageStats,
    pub top_n: Vec<ResourceTypeCount>,
    pub computed_at: DateTime<Utc>,
    /// Set when this snapshot is being served past its TTL because a fresh
    /// computation failed (SS 7: "last-known-good snapshot ... annotated with
    /// a staleness marker").
    pub stale: bool,
}

/// Supplies the settings snapshot the coverage/success-rate projection runs
/// under (SS 9 "model as explicit dependencies" rather than a singleton).
pub trait ActiveSettingsProvider: Send + Sync {
    fn snapshot(&self) -> ValidationSettings;
}

pub struct DashboardAggregator {
    fhir_client: Arc<dyn FhirServerClient>,
    store: Arc<dyn ResultStore>,
    settings: Arc<dyn ActiveSettingsProvider>,
    config: DashboardConfig,
    cache: TtlSlot<DashboardSnapshot>,
}

impl DashboardAggregator {
    pub fn new(
        fhir_client: Arc<dyn FhirServerClient>,
        store: Arc<dyn ResultStore>,
        settings: Arc<dyn ActiveSettingsProvider>,
        config: DashboardConfig,
    ) -> Self {
        Self { fhir_client, store, settings, config, cache: TtlSlot::new(config.cache_ttl) }
    }

    /// Settings changes invalidate the cache (SS 4.12 `settingsChanged` is a
    /// cache-invalidation trigger for this aggregator).
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        if let Some(cached) = self.cache.get().await {
            return cached;
        }
        match self.compute().await {
            Ok(fresh) => {
                self.cache.set(fresh.clone()).await;
                fresh
            }
            Err(err) => {
                tracing::warn!(%err, "dashboard recompute failed; serving last-known-good snapshot");
                match self.cache.get_stale().await {
                    Some(mut stale) => {
                        stale.stale = true;
                        stale
                    }
                    None => DashboardSnapshot {
                        server_counts: Vec::new(),
                        total_server_resources: 0,
                        coverage: CoverageStats { total_server_resources: 0, validated_resources: 0, coverage: 0.0, success_rate: 0.0 },
                        top_n: Vec::new(),
                        computed_at: Utc::now(),
                        stale: true,
                    },
                }
            }
        }
    }

    async fn compute(&self) -> Result<DashboardSnapshot, fhirval_orchestrator::FhirClientError> {
        let types = self.fhir_client.resource_types().await?;
        let mut server_counts = Vec::with_capacity(types.len());

        for chunk in types.chunks(self.config.count_batch_size.max(1)) {
            let counted = futures::future::join_all(chunk.iter().map(|resource_type| {
                let resource_type = resource_type.clone();
                async move {
                    let count = self.fhir_client.count(&resource_type).await.unwrap_or(0);
                    ResourceTypeCount { resource_type, count }
                }
            }))
            .await;
            server_counts.extend(counted);
            if !self.config.count_batch_delay.is_zero() {
                tokio::time::sleep(self.config.count_batch_delay).await;
            }
        }

        let total_server_resources: u64 = server_counts.iter().map(|c| c.count).sum();

        let enabled = self.settings.snapshot().enabled_aspects();
        let latest_results = self.store.all_latest().await.unwrap_or_default();
        let validated_resources = latest_results.len() as u64;
        let valid_resources = latest_results.iter().filter(|r| r.project(&enabled).is_valid).count() as u64;

        let coverage = if total_server_resources == 0 {
            0.0
        } else {
            validated_resources as f64 / total_server_resources as f64
        };
        let success_rate = if validated_resources == 0 {
            0.0
        } else {
            valid_resources as f64 / validated_resources as f64
        };

        let mut top_n = server_counts.clone();
        top_n.sort_by(|a, b| b.count.cmp(&a.count));
        top_n.truncate(self.config.top_n);

        Ok(DashboardSnapshot {
            server_counts,
            total_server_resources,
            coverage: CoverageStats { total_server_resources, validated_resources, coverage, success_rate },
            top_n,
            computed_at: Utc::now(),
            stale: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fhirval_core::{Aspect, ValidationResult};
    use fhirval_orchestrator::{FhirClientError, ResourcePage};
    use fhirval_persistence::InMemoryResultStore;
    use std::collections::HashMap;

    struct FakeServer;

    #[async_trait]
    impl FhirServerClient for FakeServer {
        async fn resource_types(&self) -> Result<Vec<String>, FhirClientError> {
            Ok(vec!["Patient".to_string(), "Observation".to_string()])
        }
        async fn count(&self, resource_type: &str) -> Result<u64, FhirClientError> {
            Ok(if resource_type == "Patient" { 10 } else { 5 })
        }
        async fn search_page(&self, _: &str, _: u64, _: u32) -> Result<ResourcePage, FhirClientError> {
            Ok(ResourcePage::default())
        }
        async fn read(&self, resource_type: &str, id: &str) -> Result<serde_json::Value, FhirClientError> {
            Ok(serde_json::json!({"resourceType": resource_type, "id": id}))
        }
    }

    struct FixedSettings;
    impl ActiveSettingsProvider for FixedSettings {
        fn snapshot(&self) -> ValidationSettings {
            ValidationSettings::default_settings("test")
        }
    }

    #[tokio::test]
    async fn computes_counts_and_coverage() {
        let store = Arc::new(InMemoryResultStore::new());
        let mut r = ValidationResult::assemble("Patient".into(), "p1".into(), "sh".into(), "rh".into(), HashMap::new(), &Aspect::ALL);
        r.is_valid = true;
        store.store(&r).await.unwrap();

        let aggregator = DashboardAggregator::new(
            Arc::new(FakeServer),
            store,
            Arc::new(FixedSettings),
            DashboardConfig { cache_ttl: Duration::from_secs(60), count_batch_delay: Duration::ZERO, ..Default::default() },
        );

        let snapshot = aggregator.snapshot().await;
        assert_eq!(snapshot.total_server_resources, 15);
        assert_eq!(snapshot.coverage.validated_resources, 1);
        assert!((snapshot.coverage.coverage - (1.0 / 15.0)).abs() < 1e-9);
        assert_eq!(snapshot.coverage.success_rate, 1.0);
        assert!(!snapshot.stale);
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let store = Arc::new(InMemoryResultStore::new());
        let aggregator = DashboardAggregator::new(
            Arc::new(FakeServer),
            store,
            Arc::new(FixedSettings),
            DashboardConfig { cache_ttl: Duration::from_secs(60), count_batch_delay: Duration::ZERO, ..Default::default() },
        );
        let first = aggregator.snapshot().await;
        let second = aggregator.snapshot().await;
        assert_eq!(first.computed_at, second.computed_at);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let store = Arc::new(InMemoryResultStore::new());
        let aggregator = DashboardAggregator::new(
            Arc::new(FakeServer),
            store,
            Arc::new(FixedSettings),
            DashboardConfig { cache_ttl: Duration::from_secs(60), count_batch_delay: Duration::ZERO, ..Default::default() },
        );
        aggregator.snapshot().await;
        aggregator.invalidate().await;
        assert!(aggregator.cache.get().await.is_none());
    }
}
