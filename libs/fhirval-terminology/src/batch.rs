//! §4.5 Batch Code Validator: dedupe, cache-partition, group, bounded-parallel
//! chunked fan-out, in-flight request dedup, and result assembly.

use crate::cache::{self, CacheResult, TerminologyCache};
use crate::client::{TerminologyClient, ValidateCodeParams, ValidationResponse};
use fhirval_core::ExtractedCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
const MAX_CONCURRENT_CHUNKS: usize = 4;

#[derive(Debug, Clone)]
pub struct CodeValidationOutcome {
    pub valid: bool,
    pub display: Option<String>,
    pub message: Option<String>,
    pub from_cache: bool,
    /// Set when the underlying response came back as a transport/upstream failure
    /// (timeout, network error, non-2xx) rather than a legitimate "code not found"
    /// answer — §4.5's distinction between a synthetic-invalid result and a failure.
    pub is_failure: bool,
    /// Set when the response was a graceful-degradation answer for a known-external
    /// system (§4.4 step 2 / HTTP 422 fallback) rather than a genuine validity check.
    /// Drives the terminology aspect's "error vs. information" split (§4.6).
    pub degraded: bool,
}

fn is_failure_code(code: &str) -> bool {
    matches!(code, "TIMEOUT" | "NETWORK_ERROR" | "INVALID_RESPONSE") || code.starts_with("HTTP_")
}

const EXTERNAL_UNVALIDATABLE_CODE: &str = "external-system-unvalidatable";

#[derive(Debug, Clone, Default)]
pub struct BatchValidationResult {
    pub results: HashMap<String, Vec<(String, CodeValidationOutcome)>>, // path -> (dedup key, outcome)
    pub total_codes: usize,
    pub validated: usize,
    pub cache_hits: usize,
    pub failures: usize,
    pub total_time_ms: u64,
    pub by_system: HashMap<String, usize>,
}

/// Map from `(system, code, valueSet)` dedup-key's string form to its in-flight or
/// completed validation — the request-deduplication contract from §4.5 step 5 and
/// §8 ("at most once for `k` during that window").
type InFlight = Arc<AsyncMutex<HashMap<String, Arc<tokio::sync::OnceCell<ValidationResponse>>>>>;

pub struct BatchCodeValidator {
    client: Arc<TerminologyClient>,
    cache: Arc<TerminologyCache>,
    in_flight: InFlight,
}

impl BatchCodeValidator {
    pub fn new(client: Arc<TerminologyClient>, cache: Arc<TerminologyCache>) -> Self {
        Self { client, cache, in_flight: Arc::new(AsyncMutex::new(HashMap::new())) }
    }

    pub async fn validate_batch(
        &self,
        codes: &[ExtractedCode],
        fhir_version: &str,
        server_url: &str,
        offline_mode: bool,
        max_batch_size: Option<usize>,
    ) -> BatchValidationResult {
        let start = Instant::now();
        let max_batch_size = max_batch_size.unwrap_or(DEFAULT_MAX_BATCH_SIZE).max(1);

        if codes.is_empty() {
            return BatchValidationResult { total_time_ms: start.elapsed().as_millis() as u64, ..Default::default() };
        }

        // Step 1: dedupe by (system, code, valueSet), remembering original paths.
        let mut unique: HashMap<(String, String, String), ExtractedCode> = HashMap::new();
        let mut paths_by_key: HashMap<(String, String, String), Vec<String>> = HashMap::new();
        for c in codes {
            let k = c.dedup_key();
            unique.entry(k.clone()).or_insert_with(|| c.clone());
            paths_by_key.entry(k).or_default().push(c.path.clone());
        }

        // Step 2: cache check, partitioning into cached / to-validate.
        let mut outcomes: HashMap<(String, String, String), CodeValidationOutcome> = HashMap::new();
        let mut to_validate: Vec<ExtractedCode> = Vec::new();
        let mut cache_hits = 0usize;

        for (k, code) in &unique {
            let cache_key = cache::key(&code.system, &code.code, code.value_set.as_deref(), fhir_version);
            match self.cache.get(&cache_key) {
                Some(hit) => {
                    cache_hits += 1;
                    outcomes.insert(
                        k.clone(),
                        CodeValidationOutcome {
                            valid: hit.valid,
                            display: hit.display,
                            message: hit.message,
                            from_cache: true,
                            is_failure: false,
                            degraded: hit.degraded,
                        },
                    );
                }
                None => to_validate.push(code.clone()),
            }
        }

        // Step 3: group by system, for logging/metrics only.
        let mut by_system: HashMap<String, usize> = HashMap::new();
        for c in &to_validate {
            *by_system.entry(c.system.clone()).or_insert(0) += 1;
        }

        // Step 4/5: parallel batched fan-out, bounded chunk concurrency, in-flight dedup.
        let mut failures = 0usize;
        let chunks: Vec<Vec<ExtractedCode>> =
            to_validate.chunks(max_batch_size).map(|c| c.to_vec()).collect();

        for chunk_group in chunks.chunks(MAX_CONCURRENT_CHUNKS) {
            let futures = chunk_group.iter().map(|chunk| self.validate_chunk(chunk, fhir_version, server_url));
            let chunk_results: Vec<Vec<((String, String, String), CodeValidationOutcome)>> =
                futures::future::join_all(futures).await;
            for result in chunk_results {
                for (k, outcome) in result {
                    if outcome.is_failure {
                        failures += 1;
                    }
                    // Step 6: cache every freshly validated result.
                    let code = unique.get(&k).unwrap();
                    let cache_key = cache::key(&code.system, &code.code, code.value_set.as_deref(), fhir_version);
                    self.cache.set(
                        cache_key,
                        CacheResult {
                            valid: outcome.valid,
                            display: outcome.display.clone(),
                            message: outcome.message.clone(),
                            degraded: outcome.degraded,
                        },
                        offline_mode,
                    );
                    outcomes.insert(k, outcome);
                }
            }
        }

        // Step 7: assemble, expanding per-key outcomes back out across every original path.
        let mut results: HashMap<String, Vec<(String, CodeValidationOutcome)>> = HashMap::new();
        for (k, paths) in &paths_by_key {
            let outcome = outcomes.get(k).cloned().unwrap_or(CodeValidationOutcome {
                valid: false,
                display: None,
                message: Some("not validated".to_string()),
                from_cache: false,
                is_failure: true,
                degraded: false,
            });
            let key_str = format!("{}|{}|{}", k.0, k.1, k.2);
            for path in paths {
                results.entry(path.clone()).or_default().push((key_str.clone(), outcome.clone()));
            }
        }

        BatchValidationResult {
            total_codes: codes.len(),
            validated: unique.len(),
            cache_hits,
            failures,
            total_time_ms: start.elapsed().as_millis() as u64,
            by_system,
            results,
        }
    }

    async fn validate_chunk(
        &self,
        chunk: &[ExtractedCode],
        fhir_version: &str,
        server_url: &str,
    ) -> Vec<((String, String, String), CodeValidationOutcome)> {
        let futures = chunk.iter().map(|code| self.validate_one(code, fhir_version, server_url));
        futures::future::join_all(futures).await
    }

    /// A single code's validation, deduplicated at flight time: concurrent callers
    /// asking for the same `(system, code, valueSet, version)` share one upstream
    /// request (§4.5 step 5, §8 request-deduplication invariant).
    async fn validate_one(
        &self,
        code: &ExtractedCode,
        fhir_version: &str,
        server_url: &str,
    ) -> ((String, String, String), CodeValidationOutcome) {
        let k = code.dedup_key();
        let flight_key = cache::key(&code.system, &code.code, code.value_set.as_deref(), fhir_version);

        let cell = {
            let mut guard = self.in_flight.lock().await;
            guard.entry(flight_key.clone()).or_insert_with(|| Arc::new(tokio::sync::OnceCell::new())).clone()
        };

        let response = cell
            .get_or_init(|| async {
                let params = ValidateCodeParams {
                    system: code.system.clone(),
                    code: code.code.clone(),
                    display: code.display.clone(),
                    value_set: code.value_set.clone(),
                    url: None,
                };
                self.client.validate_code(&params, server_url).await
            })
            .await
            .clone();

        self.in_flight.lock().await.remove(&flight_key);

        (
            k,
            CodeValidationOutcome {
                valid: response.valid,
                is_failure: is_failure_code(&response.code),
                degraded: response.code == EXTERNAL_UNVALIDATABLE_CODE,
                display: response.display,
                message: response.message,
                from_cache: false,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn validator() -> BatchCodeValidator {
        let client = Arc::new(TerminologyClient::new(Duration::from_secs(1), Duration::from_secs(1)));
        let cache = Arc::new(TerminologyCache::new(1000, Duration::from_secs(300)));
        BatchCodeValidator::new(client, cache)
    }

    #[tokio::test]
    async fn empty_batch_yields_zeroed_result_with_no_upstream_calls() {
        let result = validator().validate_batch(&[], "r4", "http://unreachable.invalid", false, None).await;
        assert_eq!(result.total_codes, 0);
        assert_eq!(result.validated, 0);
        assert_eq!(result.cache_hits, 0);
        assert_eq!(result.failures, 0);
    }

    #[tokio::test]
    async fn core_table_codes_validate_without_a_real_server() {
        let codes = vec![ExtractedCode {
            system: "http://hl7.org/fhir/administrative-gender".to_string(),
            code: "male".to_string(),
            display: None,
            value_set: None,
            path: "gender".to_string(),
        }];
        let result = validator().validate_batch(&codes, "r4", "http://unreachable.invalid", false, None).await;
        assert_eq!(result.validated, 1);
        assert_eq!(result.total_codes, 1);
        let (_, outcome) = &result.results["gender"][0];
        assert!(outcome.valid);
    }

    #[tokio::test]
    async fn repeated_codes_across_paths_are_deduplicated_then_expanded() {
        let codes = vec![
            ExtractedCode {
                system: "http://hl7.org/fhir/administrative-gender".into(),
                code: "male".into(),
                display: None,
                value_set: None,
                path: "a.gender".into(),
            },
            ExtractedCode {
                system: "http://hl7.org/fhir/administrative-gender".into(),
                code: "male".into(),
                display: None,
                value_set: None,
                path: "b.gender".into(),
            },
        ];
        let v = validator();
        let result = v.validate_batch(&codes, "r4", "http://unreachable.invalid", false, None).await;
        assert_eq!(result.total_codes, 2);
        assert_eq!(result.validated, 1); // deduplicated
        assert!(result.results.contains_key("a.gender"));
        assert!(result.results.contains_key("b.gender"));
    }

    #[tokio::test]
    async fn known_external_system_is_flagged_degraded() {
        let codes = vec![ExtractedCode {
            system: "urn:iso:std:iso:3166".into(),
            code: "DE".into(),
            display: None,
            value_set: None,
            path: "country".into(),
        }];
        let result = validator().validate_batch(&codes, "r4", "http://unreachable.invalid", false, None).await;
        let (_, outcome) = &result.results["country"][0];
        assert!(outcome.valid);
        assert!(outcome.degraded);
    }

    #[tokio::test]
    async fn degraded_flag_survives_a_cache_hit() {
        let v = validator();
        let codes = vec![ExtractedCode {
            system: "urn:iso:std:iso:3166".into(),
            code: "DE".into(),
            display: None,
            value_set: None,
            path: "country".into(),
        }];
        v.validate_batch(&codes, "r4", "http://unreachable.invalid", false, None).await;
        let second = v.validate_batch(&codes, "r4", "http://unreachable.invalid", false, None).await;
        let (_, outcome) = &second.results["country"][0];
        assert!(outcome.from_cache);
        assert!(outcome.degraded);
    }

    #[tokio::test]
    async fn second_call_for_same_code_is_served_from_cache() {
        let v = validator();
        let codes = vec![ExtractedCode {
            system: "urn:iso:std:iso:3166".into(),
            code: "DE".into(),
            display: None,
            value_set: None,
            path: "country".into(),
        }];
        v.validate_batch(&codes, "r4", "http://unreachable.invalid", false, None).await;
        let second = v.validate_batch(&codes, "r4", "http://unreachable.invalid", false, None).await;
        assert_eq!(second.cache_hits, 1);
    }
}
