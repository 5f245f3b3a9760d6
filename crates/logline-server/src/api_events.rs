//! Event ingestion and listing handlers.

use crate::api::{parse_app_id, parse_level, parse_timestamp, run_blocking, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use logline_store::{EventFilter, EventRecord, Level, NewEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The request header carrying the ingest credential. A secret, so it never
/// travels as a query parameter or body field.
pub const INGEST_CREDENTIAL_HEADER: &str = "x-ingest-credential";

/// Largest page the listing endpoint will serve.
const MAX_PAGE_SIZE: i64 = 50;

/// Upper bound on message length, matching the stored column contract.
const MAX_MESSAGE_CHARS: usize = 255;

/// Request body for `POST /apps/{id}/events`.
#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    /// When the event occurred on the client (RFC 3339).
    pub occurred_at: DateTime<Utc>,
    /// Severity level.
    pub level: Level,
    /// Free-text message.
    pub message: String,
    /// Optional structured stack payload.
    #[serde(default)]
    pub stack: Option<serde_json::Value>,
    /// Optional structured tag payload.
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
}

/// Response body returned after successful ingestion.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestEventResponse {
    pub id: i64,
    pub application_id: i64,
    /// Server-assigned receipt timestamp, as persisted.
    pub received_at: DateTime<Utc>,
}

/// A single event in a listing response.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: i64,
    pub application_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<serde_json::Value>,
}

impl From<EventRecord> for EventResponse {
    fn from(event: EventRecord) -> Self {
        Self {
            id: event.id,
            application_id: event.application_id,
            occurred_at: event.occurred_at,
            received_at: event.received_at,
            level: event.level,
            message: event.message,
            stack: event.stack,
            tags: event.tags,
        }
    }
}

/// Response body for `GET /apps/{id}/events`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventListResponse {
    pub items: Vec<EventResponse>,
    /// Always `offset + limit`; callers detect exhaustion via a short page.
    pub next_offset: i64,
}

/// Query parameters for `GET /apps/{id}/events`.
#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    /// Page size, required, 1..=50.
    pub limit: Option<i64>,
    /// Pagination offset, required, >= 0.
    pub offset: Option<i64>,
    /// Exact-match severity filter.
    pub level: Option<String>,
    /// Inclusive lower bound on receipt time (RFC 3339).
    pub since: Option<String>,
    /// Inclusive upper bound on receipt time (RFC 3339).
    pub until: Option<String>,
}

/// Handler for `POST /apps/{id}/events`.
pub async fn ingest_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<IngestEventRequest>,
) -> Result<(StatusCode, Json<IngestEventResponse>), ApiError> {
    let application_id = parse_app_id(&raw_id)?;

    let credential = headers
        .get(INGEST_CREDENTIAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| {
            ApiError::Validation("missing X-Ingest-Credential header".to_string())
        })?;

    if payload.message.is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }
    if payload.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let event = NewEvent {
        occurred_at: payload.occurred_at,
        level: payload.level,
        message: payload.message,
        stack: payload.stack,
        tags: payload.tags,
    };

    let receipt = run_blocking(state, move |conn| {
        logline_store::ingest_event(conn, application_id, &credential, &event)
            .map_err(ApiError::from)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestEventResponse {
            id: receipt.id,
            application_id: receipt.application_id,
            received_at: receipt.received_at,
        }),
    ))
}

/// Handler for `GET /apps/{id}/events`.
pub async fn list_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Query(params): Query<ListEventsQuery>,
) -> Result<Json<EventListResponse>, ApiError> {
    let application_id = parse_app_id(&raw_id)?;

    let limit = params
        .limit
        .ok_or_else(|| ApiError::Validation("limit is required".to_string()))?;
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let offset = params
        .offset
        .ok_or_else(|| ApiError::Validation("offset is required".to_string()))?;
    if offset < 0 {
        return Err(ApiError::Validation(
            "offset must be zero or greater".to_string(),
        ));
    }

    let level = params.level.as_deref().map(parse_level).transpose()?;
    let since = params
        .since
        .as_deref()
        .map(|raw| parse_timestamp("since", raw))
        .transpose()?;
    let until = params
        .until
        .as_deref()
        .map(|raw| parse_timestamp("until", raw))
        .transpose()?;

    let filter = EventFilter {
        limit,
        offset,
        level,
        since,
        until,
    };

    let events = run_blocking(state, move |conn| {
        logline_store::list_events(conn, application_id, &filter).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(EventListResponse {
        items: events.into_iter().map(Into::into).collect(),
        next_offset: offset + limit,
    }))
}
