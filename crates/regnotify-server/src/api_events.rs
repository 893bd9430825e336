//! Event log API handlers.
//!
//! Provides:
//! - `POST /api/v1/events`: registry notification endpoint
//! - `GET /api/v1/events`: paginated history, newest first

use crate::api::{ApiError, EventsQuery};
use crate::ingest::{write_and_publish, IngestError};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Query},
    Json,
};
use regnotify_types::Envelope;
use serde_json::{json, Value};
use std::sync::Arc;

/// Handler for `POST /api/v1/events`.
///
/// Accepts a registry notification envelope. The body is decoded without
/// looking at `Content-Type`, since registries send their own vendor type.
pub async fn write_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let envelope: Envelope = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "rejecting malformed notification body");
        ApiError::BadRequest("invalid JSON body given".to_string())
    })?;

    match write_and_publish(state.store.clone(), &state.broker, envelope.events).await {
        Ok(count) => {
            tracing::debug!(count, "accepted notification batch");
            Ok(Json(json!({ "message": "successfully wrote events" })))
        }
        Err(e) => {
            match &e {
                IngestError::Store(source) => {
                    tracing::error!(error = %source, "failed to write events")
                }
                IngestError::Join(source) => {
                    tracing::error!(error = %source, "event write task failed")
                }
            }
            Err(ApiError::InternalServerError(
                "failed to write events".to_string(),
            ))
        }
    }
}

/// Handler for `GET /api/v1/events`.
///
/// Returns `{"events": [...]}`, newest first. Pass the ID of the last event
/// as `offset` to fetch the next page.
pub async fn read_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<Envelope>, ApiError> {
    let filter = params.into_filter()?;
    let store = state.store.clone();

    let events = tokio::task::spawn_blocking(move || store.read_events(&filter))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "event read task failed");
            ApiError::InternalServerError("failed to read events".to_string())
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "failed to read events");
            ApiError::InternalServerError("failed to read events".to_string())
        })?;

    Ok(Json(Envelope { events }))
}
