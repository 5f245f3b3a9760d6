//! Canonical timestamp handling for the TEXT timestamp columns.
//!
//! Every timestamp is stored as UTC in one fixed-width format so that
//! lexicographic comparison in SQL equals chronological comparison. The
//! format is also understood by SQLite's date functions, which the
//! timeseries bucketing relies on.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Storage format: fixed three-digit fractional seconds, trailing `Z`.
pub(crate) const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats a UTC timestamp into the canonical stored representation.
pub(crate) fn to_stored(ts: DateTime<Utc>) -> String {
    ts.format(STORED_FORMAT).to_string()
}

/// Parses a stored timestamp back into a `DateTime<Utc>`.
///
/// `idx` is the column index, reported if the stored text is not in the
/// canonical format (which would indicate a corrupted row).
pub(crate) fn from_stored(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, STORED_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
