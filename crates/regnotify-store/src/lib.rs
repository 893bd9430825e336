//! Durable, ordered event log for regnotify.
//!
//! Events are kept in two logical collections inside one SQLite database:
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `events` | ordering key (`timestamp ‖ id`) | JSON-encoded [`Event`] |
//! | `events_id_index` | event ID | ordering key |
//!
//! The ordering key sorts chronologically as raw bytes, so every range
//! query is a plain key scan with no secondary sort. The ID index turns an
//! opaque pagination offset (an event ID) into a key without scanning.
//!
//! Both collections are written in one transaction per batch; readers see a
//! WAL snapshot and never observe half a batch.
//!
//! [`NopEventStore`] satisfies the same [`EventStore`] contract without any
//! storage, for deployments that only broadcast.
//!
//! [`Event`]: regnotify_types::Event

mod error;
mod filter;
pub mod key;
mod nop;
mod sqlite;

pub use error::{EncodeError, StoreError};
pub use filter::EventFilter;
pub use key::{OrderingKey, TimeBound};
pub use nop::NopEventStore;
pub use sqlite::SqliteEventStore;

use regnotify_types::Event;

/// Capability set shared by every storage backend.
///
/// Both operations block on the underlying engine; async callers should run
/// them on a blocking thread.
pub trait EventStore: Send + Sync {
    /// Appends every event in one atomic transaction.
    ///
    /// Either the whole batch becomes visible or none of it does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encoding`] if any event cannot be encoded (before
    /// anything is written), or a storage error if the transaction fails.
    fn write_events(&self, events: &[Event]) -> Result<(), StoreError>;

    /// Returns events newest-first, bounded by `filter`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read transaction fails, or
    /// [`StoreError::Decoding`] if a stored record cannot be decoded.
    fn read_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError>;
}
