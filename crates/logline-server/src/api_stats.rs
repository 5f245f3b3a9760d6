//! Statistics handlers.
//!
//! All three endpoints require a `since`/`until` window with
//! `since < until`, validated before any store call.

use crate::api::{parse_app_id, parse_level, parse_timestamp, run_blocking, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use chrono::{DateTime, Utc};
use logline_store::{Interval, Level, StatsRange};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default and maximum entry counts for top-messages.
const DEFAULT_TOP_LIMIT: i64 = 10;
const MAX_TOP_LIMIT: i64 = 100;

/// Query parameters for `GET /apps/{id}/stats/timeseries`.
#[derive(Debug, Deserialize)]
pub struct TimeseriesQuery {
    pub since: Option<String>,
    pub until: Option<String>,
    /// Bucket size, `hour` (default) or `day`.
    pub interval: Option<String>,
    pub level: Option<String>,
}

/// Query parameters for `GET /apps/{id}/stats/by-level`.
#[derive(Debug, Deserialize)]
pub struct ByLevelQuery {
    pub since: Option<String>,
    pub until: Option<String>,
}

/// Query parameters for `GET /apps/{id}/stats/top-messages`.
#[derive(Debug, Deserialize)]
pub struct TopMessagesQuery {
    pub since: Option<String>,
    pub until: Option<String>,
    /// Maximum entries to return, 1..=100 (default 10).
    pub limit: Option<i64>,
    pub level: Option<String>,
}

/// Single time bucket in a timeseries response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub bucket_start: DateTime<Utc>,
    pub count: i64,
}

/// Response body for `GET /apps/{id}/stats/timeseries`.
///
/// Buckets with zero events are omitted; the series is sparse.
#[derive(Debug, Serialize, Deserialize)]
pub struct TimeseriesResponse {
    pub interval: Interval,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub series: Vec<SeriesPoint>,
}

/// Single severity-level aggregate item.
#[derive(Debug, Serialize, Deserialize)]
pub struct ByLevelItem {
    pub level: Level,
    pub count: i64,
}

/// Response body for `GET /apps/{id}/stats/by-level`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ByLevelResponse {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub items: Vec<ByLevelItem>,
}

/// Single entry representing a frequently occurring message.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopMessageItem {
    pub message: String,
    pub count: i64,
    pub last_seen: DateTime<Utc>,
}

/// Response body for `GET /apps/{id}/stats/top-messages`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopMessagesResponse {
    pub limit: i64,
    pub items: Vec<TopMessageItem>,
}

/// Parses and validates the mandatory statistics window.
fn parse_window(since: Option<&str>, until: Option<&str>) -> Result<StatsRange, ApiError> {
    let since = since.ok_or_else(|| ApiError::Validation("since is required".to_string()))?;
    let until = until.ok_or_else(|| ApiError::Validation("until is required".to_string()))?;

    let since = parse_timestamp("since", since)?;
    let until = parse_timestamp("until", until)?;

    StatsRange::new(since, until).map_err(ApiError::from)
}

fn parse_interval(raw: Option<&str>) -> Result<Interval, ApiError> {
    match raw {
        None => Ok(Interval::Hour),
        Some(raw) => raw.parse().map_err(|_| {
            ApiError::Validation(format!(
                "invalid interval: {raw}. Expected one of: hour, day"
            ))
        }),
    }
}

/// Handler for `GET /apps/{id}/stats/timeseries`.
pub async fn timeseries_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Query(params): Query<TimeseriesQuery>,
) -> Result<Json<TimeseriesResponse>, ApiError> {
    let application_id = parse_app_id(&raw_id)?;
    let window = parse_window(params.since.as_deref(), params.until.as_deref())?;
    let interval = parse_interval(params.interval.as_deref())?;
    let level = params.level.as_deref().map(parse_level).transpose()?;

    let buckets = run_blocking(state, move |conn| {
        logline_store::timeseries(conn, application_id, window, interval, level)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(TimeseriesResponse {
        interval,
        since: window.since(),
        until: window.until(),
        series: buckets
            .into_iter()
            .map(|b| SeriesPoint {
                bucket_start: b.bucket_start,
                count: b.count,
            })
            .collect(),
    }))
}

/// Handler for `GET /apps/{id}/stats/by-level`.
pub async fn by_level_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Query(params): Query<ByLevelQuery>,
) -> Result<Json<ByLevelResponse>, ApiError> {
    let application_id = parse_app_id(&raw_id)?;
    let window = parse_window(params.since.as_deref(), params.until.as_deref())?;

    let counts = run_blocking(state, move |conn| {
        logline_store::by_level(conn, application_id, window).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(ByLevelResponse {
        since: window.since(),
        until: window.until(),
        items: counts
            .into_iter()
            .map(|c| ByLevelItem {
                level: c.level,
                count: c.count,
            })
            .collect(),
    }))
}

/// Handler for `GET /apps/{id}/stats/top-messages`.
pub async fn top_messages_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Query(params): Query<TopMessagesQuery>,
) -> Result<Json<TopMessagesResponse>, ApiError> {
    let application_id = parse_app_id(&raw_id)?;
    let window = parse_window(params.since.as_deref(), params.until.as_deref())?;
    let level = params.level.as_deref().map(parse_level).transpose()?;

    let limit = params.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    if !(1..=MAX_TOP_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_TOP_LIMIT}"
        )));
    }

    let messages = run_blocking(state, move |conn| {
        logline_store::top_messages(conn, application_id, window, limit, level)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(TopMessagesResponse {
        limit,
        items: messages
            .into_iter()
            .map(|m| TopMessageItem {
                message: m.message,
                count: m.count,
                last_seen: m.last_seen,
            })
            .collect(),
    }))
}
