//! Query parameters for reading the event log.

use chrono::{DateTime, Utc};

/// Bounds for a historical read or a live watch.
///
/// Every field is optional; the default filter returns the whole log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Resume strictly after (older than) this event.
    pub offset_id: Option<String>,
    /// Maximum number of events to return; `0` means unbounded.
    pub limit: usize,
    /// Exclusive lower time bound: only events after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper time bound: no event after this instant.
    pub until: Option<DateTime<Utc>>,
    /// Substring that must appear in the encoded event.
    pub search_query: Option<String>,
}

impl EventFilter {
    /// Returns `true` if `ts` lies inside `(from, until]`.
    pub fn matches_time(&self, ts: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *ts > from) && self.until.map_or(true, |until| *ts <= until)
    }

    /// Returns `true` if the encoded event contains the search query.
    ///
    /// This is a brute-force scan; there is no text index behind it.
    pub fn matches_encoded(&self, encoded: &[u8]) -> bool {
        match self.search_needle() {
            Some(needle) => contains(encoded, needle),
            None => true,
        }
    }

    fn search_needle(&self) -> Option<&[u8]> {
        self.search_query
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::as_bytes)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
