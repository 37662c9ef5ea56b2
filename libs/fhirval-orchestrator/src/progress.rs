//! §4.11 Progress Tracker: a passive observer of the orchestrator and queue.
//! It never validates anything itself — it only aggregates what it is told,
//! which keeps it substitutable with a fake in tests (§9 "singletons returned
//! by get*Service()").

use std::collections::HashMap;
use std::sync::Mutex;

use fhirval_core::Aspect;
use serde::Serialize;

/// Rolling sample window per aspect, used to derive timing percentiles. Capped
/// so a long-running process doesn't grow this unboundedly.
const MAX_SAMPLES: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemLifecycle {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Default)]
struct State {
    total_resources: u64,
    processed_resources: u64,
    valid_resources: u64,
    error_resources: u64,
    status_counts: HashMap<String, u64>,
    processing_time_samples_ms: Vec<u64>,
    aspect_time_samples_ms: HashMap<Aspect, Vec<u64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub total_resources: u64,
    pub processed_resources: u64,
    pub valid_resources: u64,
    pub error_resources: u64,
    pub average_progress: f64,
    pub average_processing_time_ms: f64,
    pub status_counts: HashMap<String, u64>,
    pub aspect_timing_p50_ms: HashMap<Aspect, u64>,
    pub aspect_timing_p95_ms: HashMap<Aspect, u64>,
}

/// Maintains per-item lifecycles and aggregate statistics. Source of truth for
/// dashboard progress (§4.13 reads through here, not through the orchestrator
/// directly).
#[derive(Default)]
pub struct ProgressTracker {
    state: Mutex<State>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.state.lock().unwrap().total_resources = total;
    }

    pub fn record_item(&self, lifecycle: ItemLifecycle, is_valid: bool, processing_time_ms: u64) {
        let mut state = self.state.lock().unwrap();
        *state.status_counts.entry(lifecycle_key(lifecycle).to_string()).or_insert(0) += 1;

        if matches!(lifecycle, ItemLifecycle::Completed | ItemLifecycle::Failed) {
            state.processed_resources += 1;
            if is_valid {
                state.valid_resources += 1;
            } else {
                state.error_resources += 1;
            }
            push_capped(&mut state.processing_time_samples_ms, processing_time_ms);
        }
    }

    pub fn record_aspect_timing(&self, aspect: Aspect, elapsed_ms: u64) {
        let mut state = self.state.lock().unwrap();
        push_capped(state.aspect_time_samples_ms.entry(aspect).or_default(), elapsed_ms);
    }

    pub fn reset(&self) {
        *self.state.lock().unwrap() = State::default();
    }

    /// A read-only snapshot; callers never hold the tracker's lock (§5).
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock().unwrap();
        let average_progress = if state.total_resources == 0 {
            0.0
        } else {
            (state.processed_resources as f64 / state.total_resources as f64) * 100.0
        };
        let average_processing_time_ms = average(&state.processing_time_samples_ms);

        let mut p50 = HashMap::new();
        let mut p95 = HashMap::new();
        for (aspect, samples) in &state.aspect_time_samples_ms {
            p50.insert(*aspect, percentile(samples, 0.50));
            p95.insert(*aspect, percentile(samples, 0.95));
        }

        ProgressSnapshot {
            total_resources: state.total_resources,
            processed_resources: state.processed_resources,
            valid_resources: state.valid_resources,
            error_resources: state.error_resources,
            average_progress,
            average_processing_time_ms,
            status_counts: state.status_counts.clone(),
            aspect_timing_p50_ms: p50,
            aspect_timing_p95_ms: p95,
        }
    }
}

fn lifecycle_key(lifecycle: ItemLifecycle) -> &'static str {
    match lifecycle {
        ItemLifecycle::Started => "started",
        ItemLifecycle::Completed => "completed",
        ItemLifecycle::Failed => "failed",
    }
}

fn push_capped(samples: &mut Vec<u64>, value: u64) {
    if samples.len() >= MAX_SAMPLES {
        samples.remove(0);
    }
    samples.push(value);
}

fn average(samples: &[u64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<u64>() as f64 / samples.len() as f64
}

fn percentile(samples: &[u64], fraction: f64) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let rank = ((sorted.len() as f64 - 1.0) * fraction).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_progress_is_processed_over_total() {
        let tracker = ProgressTracker::new();
        tracker.set_total(200);
        for _ in 0..50 {
            tracker.record_item(ItemLifecycle::Completed, true, 10);
        }
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.processed_resources, 50);
        assert_eq!(snapshot.valid_resources, 50);
        assert!((snapshot.average_progress - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn error_items_counted_separately_from_valid() {
        let tracker = ProgressTracker::new();
        tracker.record_item(ItemLifecycle::Completed, true, 5);
        tracker.record_item(ItemLifecycle::Failed, false, 5);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.valid_resources, 1);
        assert_eq!(snapshot.error_resources, 1);
        assert_eq!(snapshot.processed_resources, 2);
    }

    #[test]
    fn percentile_of_empty_samples_is_zero() {
        let tracker = ProgressTracker::new();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.aspect_timing_p50_ms.get(&Aspect::Structural), None);
    }

    #[test]
    fn reset_clears_counters() {
        let tracker = ProgressTracker::new();
        tracker.record_item(ItemLifecycle::Completed, true, 5);
        tracker.reset();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.processed_resources, 0);
    }
}
