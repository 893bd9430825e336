//! SSE watch stream handler.

use crate::api::{ApiError, EventsQuery};
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    response::{
        sse::{Event as SseEvent, KeepAlive},
        Sse,
    },
};
use futures_util::Stream;
use regnotify_broker::{Broker, Sink, SinkId};
use regnotify_store::EventFilter;
use regnotify_types::Event;
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Unsubscribes a watcher from the broker when its stream is dropped.
struct WatchGuard {
    id: SinkId,
    broker: Arc<Broker<Event>>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let id = self.id;
        let broker = self.broker.clone();
        // No runtime means the process is shutting down and the broker with it.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if broker.unsubscribe(id).await.is_ok() {
                    tracing::debug!(sink = %id, "watcher disconnected");
                }
            });
        }
    }
}

/// Encodes `event` for a watcher, or returns `None` if the filter excludes it.
fn encode_for_watch(filter: &EventFilter, event: &Event) -> Option<String> {
    if !filter.matches_time(&event.timestamp) {
        return None;
    }
    let data = match serde_json::to_string(event) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, id = %event.id, "failed to encode event for watcher");
            return None;
        }
    };
    filter.matches_encoded(data.as_bytes()).then_some(data)
}

/// Handler for `GET /api/v1/events/watch`.
///
/// Streams events as they are written, one `data:` frame per event. Accepts
/// the same time and search parameters as the read endpoint; `offset` and
/// `limit` have no meaning for a live stream and are ignored.
pub async fn watch_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let filter = params.into_filter()?;

    let (sink, rx) = Sink::channel(state.watch_buffer.max(1));
    let guard = WatchGuard {
        id: sink.id(),
        broker: state.broker.clone(),
    };
    state.broker.subscribe(sink).await.map_err(|e| {
        tracing::warn!(error = %e, "rejecting watcher");
        ApiError::ServiceUnavailable("event broker is not running".to_string())
    })?;
    tracing::debug!(sink = %guard.id, "watcher connected");

    let stream = ReceiverStream::new(rx).filter_map(move |event| {
        let _guard = &guard;
        encode_for_watch(&filter, &event).map(|data| Ok(SseEvent::default().data(data)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
