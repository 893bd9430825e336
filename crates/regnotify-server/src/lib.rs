//! regnotify server library logic.

pub mod api;
pub mod api_events;
pub mod api_sse;
pub mod config;
pub mod ingest;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use regnotify_broker::Broker;
use regnotify_store::EventStore;
use regnotify_types::Event;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistent event log (or the no-op store when storage is disabled).
    pub store: Arc<dyn EventStore>,
    /// Live fan-out to watch streams.
    pub broker: Arc<Broker<Event>>,
    /// Per-watcher buffer; a watcher further behind than this misses events.
    pub watch_buffer: usize,
    /// Directory of the static web UI, if one is served.
    pub ui_dir: Option<String>,
}

/// Maximum request body size (4 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn redirect_to_ui() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/ui/")])
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/events",
            get(api_events::read_events_handler).post(api_events::write_events_handler),
        )
        .route("/api/v1/events/watch", get(api_sse::watch_events_handler));

    let router = match state.ui_dir.as_deref() {
        Some(dir) if Path::new(dir).is_dir() => {
            tracing::info!(path = %dir, "serving web UI at /ui");
            router
                .route("/", get(redirect_to_ui))
                .nest_service("/ui", ServeDir::new(dir))
        }
        Some(dir) => {
            tracing::warn!(path = %dir, "UI directory not found, skipping static file serving");
            router
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
