//! Aggregate statistics over ingested events.
//!
//! Three views, each scoped to an application and a validated time range:
//! time-bucketed counts ([`timeseries`]), per-severity counts ([`by_level`]),
//! and most frequent messages ([`top_messages`]). Range bounds are inclusive
//! on both ends, matching the event-listing filters, so counts agree across
//! views over the same range.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::StoreError;
use crate::time::{from_stored, to_stored};
use crate::types::{Interval, Level};

/// A validated statistics time range.
///
/// Construction enforces `since < until`, so every statistics query runs
/// against a well-formed window. The check happens before any database
/// interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRange {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl StatsRange {
    /// Validates and builds a range.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRange` when `since >= until`.
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self, StoreError> {
        if since >= until {
            return Err(StoreError::InvalidRange(
                "since must be earlier than until".to_string(),
            ));
        }
        Ok(Self { since, until })
    }

    /// Inclusive lower bound on receipt time.
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Inclusive upper bound on receipt time.
    pub fn until(&self) -> DateTime<Utc> {
        self.until
    }
}

/// A single time bucket with its event count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Start of the bucket (receipt time truncated to the interval).
    pub bucket_start: DateTime<Utc>,
    /// Number of events in the bucket.
    pub count: i64,
}

/// Event count for a single severity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCount {
    /// The severity level.
    pub level: Level,
    /// Number of events with this level in the range.
    pub count: i64,
}

/// Aggregate for a single distinct message string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopMessage {
    /// The message text.
    pub message: String,
    /// Number of events carrying this message in the range.
    pub count: i64,
    /// Most recent receipt time among them.
    pub last_seen: DateTime<Utc>,
}

/// Builds the shared WHERE clause for statistics queries: application scope,
/// inclusive range bounds, and an optional level filter.
fn range_clauses(
    application_id: i64,
    range: StatsRange,
    level: Option<Level>,
) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut clauses = vec![
        "application_id = ?1".to_string(),
        "received_at >= ?2".to_string(),
        "received_at <= ?3".to_string(),
    ];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
        Box::new(application_id),
        Box::new(to_stored(range.since)),
        Box::new(to_stored(range.until)),
    ];

    if let Some(level) = level {
        clauses.push("level = ?4".to_string());
        param_values.push(Box::new(level.as_str().to_string()));
    }

    (clauses.join(" AND "), param_values)
}

/// Returns time-bucketed event counts, ordered by bucket start ascending.
///
/// Buckets are formed by truncating the stored receipt timestamp to the
/// interval boundary. Buckets with zero events are omitted — the result is
/// sparse and callers must not assume contiguous buckets.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn timeseries(
    conn: &Connection,
    application_id: i64,
    range: StatsRange,
    interval: Interval,
    level: Option<Level>,
) -> Result<Vec<Bucket>, StoreError> {
    // Truncation happens in SQL on the stored canonical text, which SQLite's
    // strftime understands. The emitted bucket string is itself canonical.
    let bucket_expr = match interval {
        Interval::Hour => "strftime('%Y-%m-%dT%H:00:00.000Z', received_at)",
        Interval::Day => "strftime('%Y-%m-%dT00:00:00.000Z', received_at)",
    };

    let (where_clause, param_values) = range_clauses(application_id, range, level);
    let sql = format!(
        "SELECT {bucket_expr} AS bucket_start, COUNT(id) AS count
         FROM event
         WHERE {where_clause}
         GROUP BY bucket_start
         ORDER BY bucket_start ASC"
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let bucket_raw: String = row.get(0)?;
        Ok(Bucket {
            bucket_start: from_stored(0, &bucket_raw)?,
            count: row.get(1)?,
        })
    })?;

    let mut buckets = Vec::new();
    for row in rows {
        buckets.push(row?);
    }

    Ok(buckets)
}

/// Returns event counts grouped by severity level, ordered by count
/// descending. Levels with zero events in the range are omitted.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn by_level(
    conn: &Connection,
    application_id: i64,
    range: StatsRange,
) -> Result<Vec<LevelCount>, StoreError> {
    let (where_clause, param_values) = range_clauses(application_id, range, None);
    let sql = format!(
        "SELECT level, COUNT(id) AS count
         FROM event
         WHERE {where_clause}
         GROUP BY level
         ORDER BY count DESC"
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let level_raw: String = row.get(0)?;
        let level = level_raw.parse().map_err(|e: crate::types::ParseLevelError| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(LevelCount {
            level,
            count: row.get(1)?,
        })
    })?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }

    Ok(counts)
}

/// Returns the most frequent distinct messages in the range, with their
/// counts and most recent receipt time. Ordered by count descending, ties
/// broken by most recent receipt descending, truncated to `limit`.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn top_messages(
    conn: &Connection,
    application_id: i64,
    range: StatsRange,
    limit: i64,
    level: Option<Level>,
) -> Result<Vec<TopMessage>, StoreError> {
    let (where_clause, mut param_values) = range_clauses(application_id, range, level);
    let limit_idx = param_values.len() + 1;
    let sql = format!(
        "SELECT message, COUNT(id) AS count, MAX(received_at) AS last_seen
         FROM event
         WHERE {where_clause}
         GROUP BY message
         ORDER BY count DESC, last_seen DESC
         LIMIT ?{limit_idx}"
    );

    param_values.push(Box::new(limit));
    let params_refs: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let last_seen_raw: String = row.get(2)?;
        Ok(TopMessage {
            message: row.get(0)?,
            count: row.get(1)?,
            last_seen: from_stored(2, &last_seen_raw)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }

    Ok(messages)
}
