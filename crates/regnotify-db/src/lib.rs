//! Database layer for regnotify.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization
//! and embedded SQL migrations. The event store crate builds its ordered log
//! on top of the tables created here.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a single embedded file, no external database
//!   process. WAL allows snapshot readers to run alongside the single writer,
//!   which is exactly the access pattern of an append-mostly event log.
//! - **`r2d2` connection pool**: bounded connection reuse for the blocking
//!   tasks that serve reads and writes.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
