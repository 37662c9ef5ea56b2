//! `GET /api/validation/stream` (§6): a single server-sent-event stream
//! multiplexing pipeline progress, bulk progress, and settings lifecycle
//! events, with a heartbeat every 30s so idle connections are not reaped by
//! intermediate proxies.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "channel", rename_all = "camelCase")]
enum StreamMessage {
    Pipeline(fhirval_orchestrator::PipelineEvent),
    Bulk(fhirval_orchestrator::BulkEvent),
    Settings(fhirval_settings::SettingsEvent),
}

/// `GET /api/validation/stream`: in non-production environments (SS 6
/// `NODE_ENV`/`APP_ENV`) the first event is a synthetic `test` message so a
/// client can confirm the stream is live without waiting on real traffic.
pub async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let pipeline = BroadcastStream::new(state.pipeline_events.subscribe())
        .filter_map(|r| async move { r.ok().map(StreamMessage::Pipeline) });
    let bulk =
        BroadcastStream::new(state.bulk_events.subscribe()).filter_map(|r| async move { r.ok().map(StreamMessage::Bulk) });
    let settings = BroadcastStream::new(state.settings_events.subscribe())
        .filter_map(|r| async move { r.ok().map(StreamMessage::Settings) });

    let merged = stream::select(stream::select(pipeline, bulk), settings)
        .map(|message| Event::default().json_data(&message).unwrap_or_else(|_| Event::default().data("{}")));

    let test_event = (!state.config.logging.is_production())
        .then(|| Event::default().json_data(serde_json::json!({"channel": "test", "message": "stream connected"})).unwrap());

    let events = stream::iter(test_event).chain(merged).map(Ok);

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text("heartbeat"))
}
