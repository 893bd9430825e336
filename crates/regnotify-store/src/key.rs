//! Ordering-key codec.
//!
//! Every key the store writes, and every bound it reads with, is derived
//! from [`timestamp_prefix`]. Keeping a single encoder is what keeps the
//! write path and the read path agreeing on byte order.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::EncodeError;

/// Length of the time prefix at the start of every ordering key.
pub const TIME_PREFIX_LEN: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

/// Encodes a timestamp as 8 big-endian bytes whose byte order matches
/// chronological order.
///
/// The value is nanoseconds since the Unix epoch with the sign bit flipped,
/// so instants before 1970 still sort before instants after it.
///
/// # Errors
///
/// Returns [`EncodeError::TimestampOutOfRange`] for instants that cannot be
/// expressed as a signed 64-bit nanosecond count (before 1677 or after 2262).
pub fn timestamp_prefix(ts: &DateTime<Utc>) -> Result<[u8; TIME_PREFIX_LEN], EncodeError> {
    let nanos = ts
        .timestamp_nanos_opt()
        .ok_or(EncodeError::TimestampOutOfRange(*ts))?;
    Ok(prefix_from_nanos(nanos))
}

fn prefix_from_nanos(nanos: i64) -> [u8; TIME_PREFIX_LEN] {
    ((nanos as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Byte key of a stored event: time prefix followed by the raw event ID.
///
/// Equal timestamps are ordered by ID bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderingKey(Vec<u8>);

impl OrderingKey {
    /// Builds the key for an event.
    ///
    /// # Errors
    ///
    /// Fails when the timestamp is outside the encodable range.
    pub fn new(ts: &DateTime<Utc>, id: &str) -> Result<Self, EncodeError> {
        let prefix = timestamp_prefix(ts)?;
        let mut key = Vec::with_capacity(TIME_PREFIX_LEN + id.len());
        key.extend_from_slice(&prefix);
        key.extend_from_slice(id.as_bytes());
        Ok(Self(key))
    }

    /// Wraps raw key bytes read back from storage.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() < TIME_PREFIX_LEN {
            return write!(f, "<short key {:02x?}>", self.0);
        }
        let (prefix, id) = self.0.split_at(TIME_PREFIX_LEN);
        for byte in prefix {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "/{}", String::from_utf8_lossy(id))
    }
}

/// Position of "just after instant `t`" in key space.
///
/// Keys that sort before the bound belong to events at or before `t`; keys
/// that sort at or after it belong to events strictly after `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    /// Every encodable key is after the instant.
    BeforeAll,
    /// Keys `>=` this prefix are strictly after the instant.
    Prefix([u8; TIME_PREFIX_LEN]),
    /// No encodable key is after the instant.
    AfterAll,
}

impl TimeBound {
    /// Computes the bound separating keys `<= ts` from keys `> ts`.
    pub fn after(ts: &DateTime<Utc>) -> Self {
        match ts.timestamp_nanos_opt() {
            Some(nanos) => match nanos.checked_add(1) {
                Some(next) => Self::Prefix(prefix_from_nanos(next)),
                None => Self::AfterAll,
            },
            None if ts.timestamp() < 0 => Self::BeforeAll,
            None => Self::AfterAll,
        }
    }
}
