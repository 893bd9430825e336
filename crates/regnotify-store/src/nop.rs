//! Storage-less event store.

use regnotify_types::Event;

use crate::{EventFilter, EventStore, StoreError};

/// An [`EventStore`] that keeps nothing.
///
/// Writes succeed without side effects and reads are always empty. Used when
/// persistence is disabled and events are only broadcast to live watchers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopEventStore;

impl NopEventStore {
    pub fn new() -> Self {
        Self
    }
}

impl EventStore for NopEventStore {
    fn write_events(&self, events: &[Event]) -> Result<(), StoreError> {
        tracing::trace!(count = events.len(), "discarding events, storage disabled");
        Ok(())
    }

    fn read_events(&self, _filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        Ok(Vec::new())
    }
}
