//! Error types for the access layer.

/// Errors that can occur during store operations.
///
/// The first four variants form the domain taxonomy the HTTP boundary maps
/// to status codes; the remaining variants are infrastructure failures that
/// surface as 5xx.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (registration).
    #[error("{0}")]
    Conflict(String),

    /// A referenced application or resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The supplied application id / ingest credential pair did not match.
    #[error("{0}")]
    Forbidden(String),

    /// A statistics range was rejected before any query ran.
    #[error("{0}")]
    InvalidRange(String),

    /// A database operation failed.
    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization or deserialization of a stack/tags payload failed.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
