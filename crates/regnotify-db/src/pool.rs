//! Pooled SQLite connections for the event log.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{ffi, Connection};
use thiserror::Error;

/// Pool of connections to one event database file.
pub type DbPool = Pool<SqliteConnectionManager>;

/// How pooled connections wait on each other and how many may exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection retries a locked database before failing, in
    /// milliseconds.
    pub busy_timeout_ms: u64,

    /// Upper bound on open connections. `:memory:` gives each connection its
    /// own database, so use 1 there.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    /// r2d2 could not open or initialize the first connections.
    #[error("cannot open event database pool: {0}")]
    Build(#[from] r2d2::Error),
}

/// Journal modes a pooled connection may end up in. In-memory databases
/// cannot use WAL and stay in `memory`.
const ACCEPTED_JOURNAL_MODES: [&str; 2] = ["wal", "memory"];

/// Opens a pool over `db_path`, creating the file if needed.
///
/// Every new connection is switched to WAL with `synchronous = NORMAL` and
/// gets the configured busy timeout before the pool hands it out.
///
/// # Errors
///
/// Returns [`PoolError::Build`] if the file cannot be opened or a fresh
/// connection refuses WAL.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(move |conn| prepare_connection(conn, busy_timeout));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        max_connections = settings.pool_max_size,
        busy_timeout_ms = settings.busy_timeout_ms,
        "event database pool ready"
    );
    Ok(pool)
}

fn prepare_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !ACCEPTED_JOURNAL_MODES.contains(&mode.as_str()) {
        return Err(rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_ERROR),
            Some(format!("database stayed in {mode} journal mode instead of wal")),
        ));
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(busy_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pragma<T: rusqlite::types::FromSql>(conn: &Connection, name: &str) -> T {
        conn.query_row(&format!("PRAGMA {name};"), [], |row| row.get(0))
            .unwrap_or_else(|e| panic!("should read pragma {name}: {e}"))
    }

    #[test]
    fn file_connections_are_prepared() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("events.db");
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 2_500,
            pool_max_size: 3,
        };

        let pool = create_pool(path.to_str().unwrap(), settings).expect("pool should open");
        assert_eq!(pool.max_size(), 3);

        let conn = pool.get().expect("should get a connection");
        assert_eq!(pragma::<String>(&conn, "journal_mode"), "wal");
        // NORMAL
        assert_eq!(pragma::<i64>(&conn, "synchronous"), 1);
        assert_eq!(pragma::<i64>(&conn, "busy_timeout"), 2_500);
    }

    #[test]
    fn in_memory_database_keeps_memory_journal() {
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 1,
        };
        let pool = create_pool(":memory:", settings).expect("pool should open");
        let conn = pool.get().expect("should get a connection");

        assert_eq!(pragma::<String>(&conn, "journal_mode"), "memory");
    }
}
