//! Access layer for the logline event API.
//!
//! Implements application registration, credential-checked event ingestion,
//! filtered event listing, and the three aggregate statistics views
//! (timeseries, by-level, top messages) against the SQLite store. All
//! queries are hand-built parameterized SQL; values are always bound, never
//! interpolated.
//!
//! Every operation returns `Result<_, StoreError>`, where [`StoreError`]
//! tags the failure kind (`Conflict`, `NotFound`, `Forbidden`,
//! `InvalidRange`) so the HTTP boundary can map it to a status code without
//! inspecting messages.
//!
//! # Usage
//!
//! ```rust,ignore
//! use logline_store::{ingest_event, NewEvent, Level};
//!
//! let receipt = ingest_event(
//!     &conn,
//!     app_id,
//!     &credential,
//!     &NewEvent {
//!         occurred_at,
//!         level: Level::Error,
//!         message: "boom".to_string(),
//!         stack: None,
//!         tags: None,
//!     },
//! )?;
//! ```

mod apps;
mod error;
mod events;
mod stats;
mod time;
mod types;

pub use apps::{get_application, list_applications, register_application, Application};
pub use error::StoreError;
pub use events::{ingest_event, list_events, EventFilter, EventReceipt, EventRecord, NewEvent};
pub use stats::{by_level, timeseries, top_messages, Bucket, LevelCount, StatsRange, TopMessage};
pub use types::{Interval, Level, ParseIntervalError, ParseLevelError};

#[cfg(test)]
mod tests;
