//! Write-then-publish for incoming notification batches.

use std::sync::Arc;

use regnotify_broker::Broker;
use regnotify_store::{EventStore, StoreError};
use regnotify_types::Event;
use thiserror::Error;

/// Errors that prevent a batch from being accepted.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The store rejected the batch. Nothing was written or broadcast.
    #[error("failed to persist events: {0}")]
    Store(#[from] StoreError),

    /// The blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Persists a batch, then broadcasts each event in batch order.
///
/// Events are only published once the store has committed them, so a
/// watcher never sees an event that a subsequent read would not return.
/// A broker failure after a successful write is logged and otherwise
/// ignored: the events are durable, only the live copy is lost.
///
/// Returns the number of events accepted.
pub async fn write_and_publish(
    store: Arc<dyn EventStore>,
    broker: &Broker<Event>,
    events: Vec<Event>,
) -> Result<usize, IngestError> {
    let events = tokio::task::spawn_blocking(move || {
        store.write_events(&events)?;
        Ok::<_, StoreError>(events)
    })
    .await??;

    let count = events.len();
    for event in events {
        if let Err(e) = broker.publish(event).await {
            tracing::warn!(error = %e, "events were stored but could not be broadcast");
            break;
        }
    }

    Ok(count)
}
