//! Error types for the event store.

use chrono::{DateTime, Utc};

use crate::key::OrderingKey;

/// Errors that can occur while turning an event into its stored form.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The timestamp does not fit in a signed 64-bit nanosecond count.
    #[error("timestamp {0} is outside the encodable range")]
    TimestampOutOfRange(DateTime<Utc>),

    /// JSON serialization failed.
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during event log operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An event in a write batch could not be encoded. Nothing was written.
    #[error("failed to encode event {id}: {source}")]
    Encoding {
        /// ID of the offending event.
        id: String,
        source: EncodeError,
    },

    /// A stored record could not be decoded. The read was aborted.
    #[error("failed to decode stored event at {key}: {source}")]
    Decoding {
        /// Ordering key of the corrupt record.
        key: OrderingKey,
        source: serde_json::Error,
    },

    /// The database engine reported a failure.
    #[error("event store database error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("event store connection error: {0}")]
    Connection(#[from] r2d2::Error),
}
