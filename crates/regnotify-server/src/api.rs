//! Shared API plumbing: error responses and event query parameters.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use regnotify_store::EventFilter;
use serde::Deserialize;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
///
/// The message is what the client sees; internal detail belongs in the log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Query parameters for `GET /api/v1/events` and `GET /api/v1/events/watch`.
///
/// Everything arrives as a raw string so a malformed value can be reported
/// by parameter name. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// ID of the last event of the previous page.
    pub offset: Option<String>,
    /// Maximum number of events to return.
    pub limit: Option<String>,
    /// RFC 3339 instant; only events after it.
    pub from: Option<String>,
    /// RFC 3339 instant; only events at or before it.
    pub until: Option<String>,
    /// Substring that must appear in the event JSON.
    #[serde(rename = "searchQuery")]
    pub search_query: Option<String>,
}

impl EventsQuery {
    /// Validates the parameters and builds the store filter.
    pub fn into_filter(self) -> Result<EventFilter, ApiError> {
        let limit = match non_empty(self.limit) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                ApiError::BadRequest(
                    "invalid 'limit' parameter, must be a non-negative integer".to_string(),
                )
            })?,
            None => 0,
        };

        Ok(EventFilter {
            offset_id: non_empty(self.offset),
            limit,
            from: parse_instant("from", self.from)?,
            until: parse_instant("until", self.until)?,
            search_query: non_empty(self.search_query),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_instant(name: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = non_empty(value) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|_| {
            ApiError::BadRequest(format!(
                "invalid '{name}' parameter, must be a valid RFC 3339 timestamp"
            ))
        })
}
