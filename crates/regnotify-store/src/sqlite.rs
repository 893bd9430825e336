//! SQLite-backed event log.
//!
//! Writes go through [`SqliteEventStore::write_events`], which encodes the
//! whole batch up front and then inserts into both tables inside a single
//! `IMMEDIATE` transaction.
//!
//! Reads go through [`SqliteEventStore::read_events`], which turns the filter
//! into a half-open key range and walks it newest-first inside one read
//! transaction.

use regnotify_db::DbPool;
use regnotify_types::Event;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::error::{EncodeError, StoreError};
use crate::key::{OrderingKey, TimeBound};
use crate::{EventFilter, EventStore};

/// Event store persisting to the `events` and `events_id_index` tables.
///
/// The tables are created by `regnotify_db::run_migrations`, which must have
/// been applied to the pooled database.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: DbPool,
}

/// An event in its stored form.
struct EncodedEvent<'a> {
    id: &'a str,
    key: OrderingKey,
    value: Vec<u8>,
}

fn encode_event(event: &Event) -> Result<EncodedEvent<'_>, StoreError> {
    let encoded = OrderingKey::new(&event.timestamp, &event.id).and_then(|key| {
        let value = serde_json::to_vec(event).map_err(EncodeError::from)?;
        Ok((key, value))
    });

    match encoded {
        Ok((key, value)) => Ok(EncodedEvent {
            id: &event.id,
            key,
            value,
        }),
        Err(source) => Err(StoreError::Encoding {
            id: event.id.clone(),
            source,
        }),
    }
}

/// Key range of a read, as exclusive upper and inclusive lower byte bounds.
#[derive(Debug, Default)]
struct KeyRange {
    upper: Option<Vec<u8>>,
    lower: Option<Vec<u8>>,
}

impl KeyRange {
    /// Derives the range from the time bounds of a filter.
    ///
    /// Returns `None` when the bounds exclude every encodable key.
    fn from_filter(filter: &EventFilter) -> Option<Self> {
        let mut range = Self::default();

        if let Some(until) = &filter.until {
            match TimeBound::after(until) {
                TimeBound::BeforeAll => return None,
                TimeBound::Prefix(prefix) => range.upper = Some(prefix.to_vec()),
                TimeBound::AfterAll => {}
            }
        }

        if let Some(from) = &filter.from {
            match TimeBound::after(from) {
                TimeBound::BeforeAll => {}
                TimeBound::Prefix(prefix) => range.lower = Some(prefix.to_vec()),
                TimeBound::AfterAll => return None,
            }
        }

        Some(range)
    }

    /// Moves the start of the walk to just before `offset`, unless the
    /// current start is already older.
    fn start_before(&mut self, offset: Vec<u8>) {
        match &self.upper {
            Some(upper) if offset >= *upper => {}
            _ => self.upper = Some(offset),
        }
    }
}

impl SqliteEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl EventStore for SqliteEventStore {
    fn write_events(&self, events: &[Event]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }

        // Encode everything before touching the database so a bad event
        // aborts the batch with nothing written.
        let encoded = events
            .iter()
            .map(encode_event)
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut put_event =
                tx.prepare_cached("INSERT OR REPLACE INTO events (key, value) VALUES (?1, ?2)")?;
            let mut put_index = tx.prepare_cached(
                "INSERT OR REPLACE INTO events_id_index (id, key) VALUES (?1, ?2)",
            )?;

            for record in &encoded {
                put_event.execute(params![record.key.as_bytes(), record.value])?;
                put_index.execute(params![record.id, record.key.as_bytes()])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = encoded.len(), "wrote event batch");
        Ok(())
    }

    fn read_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let Some(mut range) = KeyRange::from_filter(filter) else {
            return Ok(Vec::new());
        };

        let mut conn = self.pool.get()?;
        // Deferred transaction: the snapshot is taken at the first read and
        // covers both the index lookup and the scan.
        let tx = conn.transaction()?;

        if let Some(offset_id) = filter.offset_id.as_deref().filter(|id| !id.is_empty()) {
            let offset_key: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT key FROM events_id_index WHERE id = ?1",
                    [offset_id],
                    |row| row.get(0),
                )
                .optional()?;

            match offset_key {
                Some(key) => range.start_before(key),
                None => tracing::debug!(offset_id, "unknown offset ID, reading without offset"),
            }
        }

        // Build the range predicate; bound values are passed as parameters.
        let mut clauses = Vec::new();
        let mut param_values: Vec<&dyn rusqlite::types::ToSql> = Vec::new();
        if let Some(upper) = &range.upper {
            param_values.push(upper);
            clauses.push(format!("key < ?{}", param_values.len()));
        }
        if let Some(lower) = &range.lower {
            param_values.push(lower);
            clauses.push(format!("key >= ?{}", param_values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT key, value FROM events {where_clause} ORDER BY key DESC");

        let mut events = Vec::new();
        {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(param_values.as_slice())?;

            while let Some(row) = rows.next()? {
                let value: Vec<u8> = row.get(1)?;
                if !filter.matches_encoded(&value) {
                    continue;
                }

                let event: Event = serde_json::from_slice(&value).map_err(|source| {
                    let key = row
                        .get::<_, Vec<u8>>(0)
                        .map(OrderingKey::from_bytes)
                        .unwrap_or_else(|_| OrderingKey::from_bytes(Vec::new()));
                    StoreError::Decoding { key, source }
                })?;
                events.push(event);

                if filter.limit > 0 && events.len() >= filter.limit {
                    break;
                }
            }
        }
        tx.commit()?;

        Ok(events)
    }
}
