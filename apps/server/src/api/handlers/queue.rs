//! `GET /api/validation/queue/stats|items|processing`, `POST
//! /api/validation/queue/cancel|clear|start|stop` (§6, §4.9). `enqueue` is a
//! SPEC_FULL supplement: §6's endpoint list is explicitly "selected", and the
//! queue is otherwise unreachable from the wire surface.

use axum::extract::{Path, State};
use axum::Json;
use fhirval_queue::{ItemContext, Priority, QueueItem, QueueStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub resource_id: String,
    pub resource: Value,
    #[serde(default)]
    pub force_revalidation: bool,
    #[serde(default)]
    pub priority: PriorityWire,
    #[serde(default)]
    pub batch_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityWire {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl From<PriorityWire> for Priority {
    fn from(value: PriorityWire) -> Self {
        match value {
            PriorityWire::Low => Priority::Low,
            PriorityWire::Normal => Priority::Normal,
            PriorityWire::High => Priority::High,
            PriorityWire::Urgent => Priority::Urgent,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub id: String,
}

const ITEM_TYPE_VALIDATE: &str = "validate";

/// `POST /api/validation/queue/enqueue`: submits one resource for
/// asynchronous validation by whichever dispatcher (in-process or the
/// `fhirval-worker` binary) is draining the queue.
pub async fn enqueue(State(state): State<AppState>, Json(body): Json<EnqueueRequest>) -> Result<Json<EnqueueResponse>> {
    let request = serde_json::json!({
        "resources": [{"resourceId": body.resource_id, "resource": body.resource}],
        "forceRevalidation": body.force_revalidation,
    });
    let context = ItemContext { requested_by: "api".to_string(), request_id: uuid::Uuid::new_v4().to_string(), batch_id: body.batch_id };
    let id = state.queue.enqueue(body.priority.into(), ITEM_TYPE_VALIDATE.to_string(), request, context).await?;
    Ok(Json(EnqueueResponse { id }))
}

/// `GET /api/validation/queue/stats`.
pub async fn stats(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.queue.get_stats().await)
}

/// `GET /api/validation/queue/items`.
pub async fn items(State(state): State<AppState>) -> Json<Vec<QueueItem>> {
    Json(state.queue.list_items().await)
}

/// `GET /api/validation/queue/processing`.
pub async fn processing(State(state): State<AppState>) -> Json<Vec<QueueItem>> {
    Json(state.queue.list_processing().await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub id: String,
}

/// `POST /api/validation/queue/cancel`.
pub async fn cancel(State(state): State<AppState>, Json(body): Json<CancelRequest>) -> Result<Json<serde_json::Value>> {
    state.queue.cancel(&body.id).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

/// `POST /api/validation/queue/cancel/:id`, path-addressed alternative to the
/// JSON-body form above.
pub async fn cancel_by_path(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
    state.queue.cancel(&id).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// `POST /api/validation/queue/clear`: drops terminal (completed, failed,
/// cancelled) items; queued and processing items are untouched.
pub async fn clear(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse { cleared: state.queue.clear_terminal().await })
}

#[derive(Debug, Serialize)]
pub struct DispatcherStatusResponse {
    pub running: bool,
}

/// `POST /api/validation/queue/start`: starts an in-process dispatcher
/// (idempotent; a no-op if the `fhirval-worker` binary, or a prior call to
/// this same endpoint, is already draining the queue).
pub async fn start(State(state): State<AppState>) -> Json<DispatcherStatusResponse> {
    state.start_dispatcher().await;
    Json(DispatcherStatusResponse { running: true })
}

/// `POST /api/validation/queue/stop`: stops the in-process dispatcher
/// started via `queue/start`. Has no effect on a separately-run
/// `fhirval-worker` process.
pub async fn stop(State(state): State<AppState>) -> Json<DispatcherStatusResponse> {
    state.stop_dispatcher().await;
    Json(DispatcherStatusResponse { running: state.is_dispatcher_running().await })
}
