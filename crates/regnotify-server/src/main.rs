//! regnotify server binary.
//!
//! Receives registry notifications over HTTP, stores them, and streams them
//! to watchers. Shuts down gracefully on SIGTERM/SIGINT.

use regnotify_broker::{Broker, BrokerConfig};
use regnotify_server::config::{self, StorageConfig};
use regnotify_server::{app, AppState};
use regnotify_store::{EventStore, NopEventStore, SqliteEventStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("REGNOTIFY_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

/// Opens the SQLite event store and brings its schema up to date.
fn open_sqlite_store(storage: &StorageConfig) -> SqliteEventStore {
    let pool = regnotify_db::create_pool(
        &storage.path,
        regnotify_db::DbRuntimeSettings {
            busy_timeout_ms: storage.busy_timeout_ms,
            pool_max_size: storage.pool_max_size,
        },
    )
    .expect("failed to create database pool, check storage.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            regnotify_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    SqliteEventStore::new(pool)
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let store: Arc<dyn EventStore> = if config.storage.enabled {
        tracing::info!(path = %config.storage.path, "using sqlite as storage backend");
        Arc::new(open_sqlite_store(&config.storage))
    } else {
        tracing::info!("no storage backend enabled, events will only be broadcast");
        Arc::new(NopEventStore::new())
    };

    let (broker, broker_loop) = Broker::new(BrokerConfig {
        command_buffer: config.broker.command_buffer,
    });
    let broker = Arc::new(broker);
    let broker_task = tokio::spawn(broker_loop.run());

    let state = AppState {
        store,
        broker: broker.clone(),
        watch_buffer: config.broker.watch_buffer,
        ui_dir: config.ui.dir.clone(),
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting regnotify server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address, is another process using this port?");

    // Stopping the broker closes every watch stream, which lets the
    // graceful shutdown finish instead of waiting on open connections.
    let shutdown = {
        let broker = broker.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("shutting down event broker");
            broker.stop();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("server error");

    if let Err(e) = broker_task.await {
        tracing::error!(error = %e, "event broker task ended abnormally");
    }

    tracing::info!("regnotify server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
