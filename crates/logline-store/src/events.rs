//! Event ingestion and filtered listing.
//!
//! Writes go through [`ingest_event`], which authorizes the caller with a
//! single lookup matching application id and ingest credential together,
//! then inserts the event and returns the persisted receipt.
//!
//! Reads go through [`list_events`], which supports level and receipt-time
//! filtering with limit/offset pagination.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::time::{from_stored, to_stored};
use crate::types::Level;

/// A client-supplied event, validated and ready to persist.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// When the event occurred on the client.
    pub occurred_at: DateTime<Utc>,
    /// Severity level.
    pub level: Level,
    /// Free-text message.
    pub message: String,
    /// Optional structured stack payload.
    pub stack: Option<serde_json::Value>,
    /// Optional structured tag payload.
    pub tags: Option<serde_json::Value>,
}

/// The persisted identity of a freshly ingested event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReceipt {
    /// Auto-incremented row ID.
    pub id: i64,
    /// The owning application.
    pub application_id: i64,
    /// Server-assigned receipt timestamp.
    pub received_at: DateTime<Utc>,
}

/// A single row from the `event` table.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Auto-incremented row ID.
    pub id: i64,
    /// The owning application.
    pub application_id: i64,
    /// Client-supplied occurrence timestamp.
    pub occurred_at: DateTime<Utc>,
    /// Server-assigned receipt timestamp.
    pub received_at: DateTime<Utc>,
    /// Severity level.
    pub level: Level,
    /// Free-text message.
    pub message: String,
    /// Optional structured stack payload.
    pub stack: Option<serde_json::Value>,
    /// Optional structured tag payload.
    pub tags: Option<serde_json::Value>,
}

/// Filter criteria for listing events.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Maximum number of events to return.
    pub limit: i64,
    /// Pagination offset.
    pub offset: i64,
    /// Exact-match severity filter.
    pub level: Option<Level>,
    /// Inclusive lower bound on receipt time.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on receipt time.
    pub until: Option<DateTime<Utc>>,
}

fn json_column(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<serde_json::Value>> {
    raw.map(|s| {
        serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn level_column(idx: usize, raw: &str) -> rusqlite::Result<Level> {
    raw.parse().map_err(|e: crate::types::ParseLevelError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRecord> {
    let occurred_at_raw: String = row.get(2)?;
    let received_at_raw: String = row.get(3)?;
    let level_raw: String = row.get(4)?;
    let stack_raw: Option<String> = row.get(6)?;
    let tags_raw: Option<String> = row.get(7)?;

    Ok(EventRecord {
        id: row.get(0)?,
        application_id: row.get(1)?,
        occurred_at: from_stored(2, &occurred_at_raw)?,
        received_at: from_stored(3, &received_at_raw)?,
        level: level_column(4, &level_raw)?,
        message: row.get(5)?,
        stack: json_column(6, stack_raw)?,
        tags: json_column(7, tags_raw)?,
    })
}

/// Ingests a single event for the given application.
///
/// Authorization is a single SELECT matching **both** the application id and
/// the ingest credential; an unknown id and a wrong credential are
/// indistinguishable to the caller, so id existence never leaks through a
/// separate error path. The insert assigns the receipt timestamp and the
/// returned receipt reflects the row exactly as persisted.
///
/// `stack` and `tags` are written only when provided; otherwise the columns
/// stay NULL.
///
/// # Errors
///
/// Returns `StoreError::Forbidden` if the id/credential pair does not match,
/// `StoreError::Serialization` if a stack/tags payload cannot be serialised,
/// or `StoreError::Database` on SQL failure.
pub fn ingest_event(
    conn: &Connection,
    application_id: i64,
    credential: &str,
    event: &NewEvent,
) -> Result<EventReceipt, StoreError> {
    let authorized: Option<i64> = conn
        .query_row(
            "SELECT id FROM application WHERE id = ?1 AND ingest_credential = ?2",
            params![application_id, credential],
            |row| row.get(0),
        )
        .optional()?;

    if authorized.is_none() {
        return Err(StoreError::Forbidden(
            "invalid application id or ingest credential".to_string(),
        ));
    }

    let stack_json = event.stack.as_ref().map(serde_json::to_string).transpose()?;
    let tags_json = event.tags.as_ref().map(serde_json::to_string).transpose()?;

    let (id, received_at_raw): (i64, String) = conn.query_row(
        "INSERT INTO event (application_id, occurred_at, received_at, level, message, stack, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         RETURNING id, received_at",
        params![
            application_id,
            to_stored(event.occurred_at),
            to_stored(Utc::now()),
            event.level.as_str(),
            event.message,
            stack_json,
            tags_json,
        ],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    tracing::debug!(
        application_id,
        event_id = id,
        level = event.level.as_str(),
        "ingested event"
    );

    Ok(EventReceipt {
        id,
        application_id,
        received_at: from_stored(1, &received_at_raw)?,
    })
}

/// Lists events for an application, most recent receipt first.
///
/// The application's existence is verified first: an unknown id is
/// `StoreError::NotFound`, while an existing application with no matching
/// events yields an empty page. All provided filters are ANDed.
///
/// # Errors
///
/// Returns `StoreError::NotFound` for an unknown application id or
/// `StoreError::Database` on SQL failure.
pub fn list_events(
    conn: &Connection,
    application_id: i64,
    filter: &EventFilter,
) -> Result<Vec<EventRecord>, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM application WHERE id = ?1)",
        params![application_id],
        |row| row.get(0),
    )?;

    if !exists {
        return Err(StoreError::NotFound(
            "application with this id does not exist".to_string(),
        ));
    }

    // Build a parameterised query dynamically. WHERE clauses and bind
    // parameters are collected separately so nothing is interpolated.
    let mut clauses = vec!["application_id = ?1".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(application_id)];
    let mut idx = 2u32;

    if let Some(level) = filter.level {
        clauses.push(format!("level = ?{idx}"));
        param_values.push(Box::new(level.as_str().to_string()));
        idx += 1;
    }

    if let Some(since) = filter.since {
        clauses.push(format!("received_at >= ?{idx}"));
        param_values.push(Box::new(to_stored(since)));
        idx += 1;
    }

    if let Some(until) = filter.until {
        clauses.push(format!("received_at <= ?{idx}"));
        param_values.push(Box::new(to_stored(until)));
        idx += 1;
    }

    let where_clause = clauses.join(" AND ");
    let sql = format!(
        "SELECT id, application_id, occurred_at, received_at, level, message, stack, tags
         FROM event
         WHERE {where_clause}
         ORDER BY received_at DESC
         LIMIT ?{idx} OFFSET ?{}",
        idx + 1
    );

    param_values.push(Box::new(filter.limit));
    param_values.push(Box::new(filter.offset));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), event_from_row)?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }

    Ok(events)
}
