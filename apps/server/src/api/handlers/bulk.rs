//! `POST /api/validation/bulk/start|pause|resume|stop`, `GET
//! /api/validation/bulk/progress` (§6, §4.10).

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkStartRequest {
    #[serde(default)]
    pub force_revalidation: bool,
    /// Accepted for wire compatibility (§6); batch size is presently a
    /// server-side config knob (`validation.bulk_batch_size`) rather than
    /// overridable per run.
    #[serde(default)]
    pub batch_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /api/validation/bulk/start` -> `{status: "starting"}`.
pub async fn start(State(state): State<AppState>, Json(body): Json<BulkStartRequest>) -> Result<Json<AckResponse>> {
    state.bulk.start(body.force_revalidation).await?;
    Ok(Json(AckResponse { status: "starting" }))
}

/// `POST /api/validation/bulk/pause` -> `{message}`.
pub async fn pause(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    state.bulk.pause().await?;
    Ok(Json(MessageResponse { message: "bulk validation pausing".to_string() }))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkResumeRequest {
    #[serde(default)]
    pub force_revalidation: bool,
}

/// `POST /api/validation/bulk/resume` -> `{message}`.
pub async fn resume(State(state): State<AppState>, Json(body): Json<BulkResumeRequest>) -> Result<Json<MessageResponse>> {
    state.bulk.resume(body.force_revalidation).await?;
    Ok(Json(MessageResponse { message: "bulk validation resuming".to_string() }))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkStopRequest {
    #[serde(default)]
    pub clear_results: bool,
}

/// `POST /api/validation/bulk/stop` -> `{message}`.
pub async fn stop(State(state): State<AppState>, Json(body): Json<BulkStopRequest>) -> Result<Json<MessageResponse>> {
    state.bulk.stop(body.clear_results).await?;
    Ok(Json(MessageResponse { message: "bulk validation stopped".to_string() }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Paused,
    NotRunning,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkProgressResponse {
    pub total_resources: Option<u64>,
    pub processed_resources: u64,
    pub valid_resources: u64,
    pub error_resources: u64,
    pub progress: f64,
    pub current_resource_type: Option<String>,
    pub next_resource_type: Option<String>,
    pub status: RunStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub estimated_time_remaining: Option<f64>,
}

/// `GET /api/validation/bulk/progress`.
pub async fn progress(State(state): State<AppState>) -> Json<BulkProgressResponse> {
    let snapshot = state.bulk.snapshot().await;

    let status = if snapshot.is_paused {
        RunStatus::Paused
    } else if snapshot.is_running {
        RunStatus::Running
    } else {
        RunStatus::NotRunning
    };

    let total_resources = snapshot.total;
    let progress_fraction = total_resources
        .filter(|total| *total > 0)
        .map(|total| snapshot.processed as f64 / total as f64)
        .unwrap_or(0.0);

    let estimated_time_remaining = snapshot.start_time.zip(total_resources).and_then(|(start, total)| {
        if snapshot.processed == 0 {
            return None;
        }
        let elapsed_ms = (Utc::now() - start).num_milliseconds().max(0) as f64;
        let rate_per_ms = snapshot.processed as f64 / elapsed_ms.max(1.0);
        let remaining = total.saturating_sub(snapshot.processed) as f64;
        Some(remaining / rate_per_ms.max(f64::EPSILON))
    });

    Json(BulkProgressResponse {
        total_resources,
        processed_resources: snapshot.processed,
        valid_resources: snapshot.valid,
        error_resources: snapshot.error,
        progress: progress_fraction,
        current_resource_type: snapshot.current_type,
        next_resource_type: snapshot.next_type,
        status,
        start_time: snapshot.start_time,
        estimated_time_remaining,
    })
}
