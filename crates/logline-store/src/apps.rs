//! Application registry operations.
//!
//! Applications are the tenants of the system: each owns a unique name, a
//! generated ingest credential, and the events submitted under it. Rows are
//! never updated after creation.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::time::{from_stored, to_stored};

/// A single row from the `application` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    /// Auto-incremented row ID.
    pub id: i64,
    /// Unique human-readable name.
    pub name: String,
    /// The shared secret required to ingest events (32 hex chars).
    pub ingest_credential: String,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Generates a fresh ingest credential: 16 cryptographically random bytes,
/// hex-encoded to 32 characters.
fn generate_credential() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn application_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Application> {
    let created_at_raw: String = row.get(3)?;
    Ok(Application {
        id: row.get(0)?,
        name: row.get(1)?,
        ingest_credential: row.get(2)?,
        created_at: from_stored(3, &created_at_raw)?,
    })
}

/// Returns true if the error is a UNIQUE constraint violation.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Registers a new application under the given name.
///
/// Generates the ingest credential, inserts the row, and returns it exactly
/// as persisted (including the server-assigned id and creation timestamp).
/// Uniqueness of both the name and the credential is enforced by the store;
/// a violation of either surfaces as `StoreError::Conflict`. A credential
/// collision is astronomically unlikely but is still a conflict, not a
/// crash.
///
/// # Errors
///
/// Returns `StoreError::Conflict` on a uniqueness violation or
/// `StoreError::Database` on any other SQL failure.
pub fn register_application(conn: &Connection, name: &str) -> Result<Application, StoreError> {
    let credential = generate_credential();
    let created_at = to_stored(Utc::now());

    let result = conn.query_row(
        "INSERT INTO application (name, ingest_credential, created_at)
         VALUES (?1, ?2, ?3)
         RETURNING id, name, ingest_credential, created_at",
        params![name, credential, created_at],
        application_from_row,
    );

    match result {
        Ok(app) => {
            tracing::info!(application = app.name.as_str(), id = app.id, "registered application");
            Ok(app)
        }
        Err(ref e) if is_unique_violation(e) => Err(StoreError::Conflict(
            "application with this name already exists".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Fetches a single application by id.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no such id exists or
/// `StoreError::Database` on SQL failure.
pub fn get_application(conn: &Connection, id: i64) -> Result<Application, StoreError> {
    conn.query_row(
        "SELECT id, name, ingest_credential, created_at FROM application WHERE id = ?1",
        params![id],
        application_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound("application with this id does not exist".to_string()))
}

/// Lists all applications in insertion order.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn list_applications(conn: &Connection) -> Result<Vec<Application>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, ingest_credential, created_at FROM application ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], application_from_row)?;

    let mut apps = Vec::new();
    for row in rows {
        apps.push(row?);
    }

    Ok(apps)
}
