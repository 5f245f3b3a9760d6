//! Unit tests for the access layer.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;

use crate::apps::{get_application, list_applications, register_application};
use crate::error::StoreError;
use crate::events::{ingest_event, list_events, EventFilter, NewEvent};
use crate::stats::{by_level, timeseries, top_messages, StatsRange};
use crate::types::{Interval, Level};

/// Creates an in-memory SQLite database with migrations applied.
fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    logline_db::run_migrations(&conn).expect("migrations should succeed");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("should enable foreign keys");
    conn
}

fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Inserts an event row directly, bypassing ingest, so tests control the
/// receipt timestamp.
fn seed_event(conn: &Connection, app_id: i64, received_at: DateTime<Utc>, level: Level, message: &str) -> i64 {
    conn.execute(
        "INSERT INTO event (application_id, occurred_at, received_at, level, message)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            app_id,
            crate::time::to_stored(received_at),
            crate::time::to_stored(received_at),
            level.as_str(),
            message,
        ],
    )
    .expect("should insert event");
    conn.last_insert_rowid()
}

fn default_filter() -> EventFilter {
    EventFilter {
        limit: 50,
        offset: 0,
        level: None,
        since: None,
        until: None,
    }
}

fn range(since: DateTime<Utc>, until: DateTime<Utc>) -> StatsRange {
    StatsRange::new(since, until).expect("range should be valid")
}

// ── Application registry ─────────────────────────────────────────────

#[test]
fn register_application_assigns_credential_and_timestamp() {
    let conn = test_db();

    let app = register_application(&conn, "svc-a").expect("register should succeed");

    assert!(app.id > 0);
    assert_eq!(app.name, "svc-a");
    assert_eq!(app.ingest_credential.len(), 32);
    assert!(
        app.ingest_credential.chars().all(|c| c.is_ascii_hexdigit()),
        "credential should be hex: {}",
        app.ingest_credential
    );

    // The returned record matches the persisted row.
    let stored = get_application(&conn, app.id).expect("get should succeed");
    assert_eq!(stored, app);
}

#[test]
fn register_duplicate_name_is_conflict() {
    let conn = test_db();

    register_application(&conn, "svc-a").expect("first register should succeed");
    let err = register_application(&conn, "svc-a").expect_err("duplicate should fail");

    match err {
        StoreError::Conflict(msg) => assert!(msg.contains("name"), "unexpected message: {msg}"),
        other => panic!("unexpected error type: {other:?}"),
    }
}

#[test]
fn distinct_applications_get_distinct_credentials() {
    let conn = test_db();

    let a = register_application(&conn, "svc-a").expect("register should succeed");
    let b = register_application(&conn, "svc-b").expect("register should succeed");

    assert_ne!(a.ingest_credential, b.ingest_credential);
}

#[test]
fn get_application_unknown_id_is_not_found() {
    let conn = test_db();

    let err = get_application(&conn, 42).expect_err("unknown id should fail");
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn list_applications_returns_insertion_order() {
    let conn = test_db();

    register_application(&conn, "svc-a").expect("register should succeed");
    register_application(&conn, "svc-b").expect("register should succeed");
    register_application(&conn, "svc-c").expect("register should succeed");

    let apps = list_applications(&conn).expect("list should succeed");
    let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["svc-a", "svc-b", "svc-c"]);
}

// ── Event ingestion ──────────────────────────────────────────────────

fn sample_event() -> NewEvent {
    NewEvent {
        occurred_at: ts(2026, 8, 7, 12, 0, 0),
        level: Level::Error,
        message: "boom".to_string(),
        stack: None,
        tags: None,
    }
}

#[test]
fn ingest_with_valid_pair_persists_event() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    let receipt = ingest_event(&conn, app.id, &app.ingest_credential, &sample_event())
        .expect("ingest should succeed");

    assert!(receipt.id > 0);
    assert_eq!(receipt.application_id, app.id);

    let events = list_events(&conn, app.id, &default_filter()).expect("list should succeed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, receipt.id);
    assert_eq!(events[0].level, Level::Error);
    assert_eq!(events[0].message, "boom");
    assert_eq!(events[0].received_at, receipt.received_at);
    assert_eq!(events[0].stack, None);
    assert_eq!(events[0].tags, None);
}

#[test]
fn ingest_with_wrong_credential_is_forbidden() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    let err = ingest_event(&conn, app.id, "00000000000000000000000000000000", &sample_event())
        .expect_err("wrong credential should fail");
    assert!(matches!(err, StoreError::Forbidden(_)));
}

#[test]
fn ingest_with_unknown_id_is_forbidden_not_not_found() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    // A valid credential with the wrong id must not reveal whether the id
    // exists: same error as a bad credential.
    let err = ingest_event(&conn, app.id + 99, &app.ingest_credential, &sample_event())
        .expect_err("unknown id should fail");
    assert!(matches!(err, StoreError::Forbidden(_)));
}

#[test]
fn ingest_round_trips_stack_and_tags() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    let stack = serde_json::json!({"frames": [{"file": "main.rs", "line": 42}]});
    let tags = serde_json::json!({"region": "eu-west-1", "build": 17});

    let event = NewEvent {
        stack: Some(stack.clone()),
        tags: Some(tags.clone()),
        ..sample_event()
    };
    ingest_event(&conn, app.id, &app.ingest_credential, &event).expect("ingest should succeed");

    let events = list_events(&conn, app.id, &default_filter()).expect("list should succeed");
    assert_eq!(events[0].stack, Some(stack));
    assert_eq!(events[0].tags, Some(tags));
}

#[test]
fn ingest_without_stack_leaves_column_null() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    let receipt = ingest_event(&conn, app.id, &app.ingest_credential, &sample_event())
        .expect("ingest should succeed");

    let (stack, tags): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT stack, tags FROM event WHERE id = ?1",
            [receipt.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("should query row");
    assert_eq!(stack, None);
    assert_eq!(tags, None);
}

// ── Event listing ────────────────────────────────────────────────────

#[test]
fn list_events_unknown_application_is_not_found() {
    let conn = test_db();

    let err = list_events(&conn, 7, &default_filter()).expect_err("unknown app should fail");
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn list_events_empty_for_application_without_events() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    let events = list_events(&conn, app.id, &default_filter()).expect("list should succeed");
    assert!(events.is_empty());
}

#[test]
fn list_events_orders_by_receipt_descending() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 0, 0), Level::Info, "first");
    seed_event(&conn, app.id, ts(2026, 1, 1, 12, 0, 0), Level::Info, "third");
    seed_event(&conn, app.id, ts(2026, 1, 1, 11, 0, 0), Level::Info, "second");

    let events = list_events(&conn, app.id, &default_filter()).expect("list should succeed");
    let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["third", "second", "first"]);
}

#[test]
fn list_events_applies_limit_and_offset() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    for i in 0..5 {
        seed_event(&conn, app.id, ts(2026, 1, 1, 10 + i, 0, 0), Level::Info, &format!("m{i}"));
    }

    let page = list_events(
        &conn,
        app.id,
        &EventFilter {
            limit: 2,
            offset: 1,
            ..default_filter()
        },
    )
    .expect("list should succeed");

    let messages: Vec<&str> = page.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["m3", "m2"]);
}

#[test]
fn list_events_short_page_past_the_end() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 0, 0), Level::Info, "only");

    let page = list_events(
        &conn,
        app.id,
        &EventFilter {
            limit: 50,
            offset: 10,
            ..default_filter()
        },
    )
    .expect("list should succeed");
    assert!(page.is_empty());
}

#[test]
fn list_events_filters_by_level() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 0, 0), Level::Info, "a");
    seed_event(&conn, app.id, ts(2026, 1, 1, 11, 0, 0), Level::Error, "b");
    seed_event(&conn, app.id, ts(2026, 1, 1, 12, 0, 0), Level::Error, "c");

    let events = list_events(
        &conn,
        app.id,
        &EventFilter {
            level: Some(Level::Error),
            ..default_filter()
        },
    )
    .expect("list should succeed");

    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.level == Level::Error));
}

#[test]
fn list_events_time_bounds_are_inclusive() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    let exact = ts(2026, 1, 1, 10, 0, 0);
    seed_event(&conn, app.id, exact, Level::Info, "on-boundary");
    seed_event(&conn, app.id, ts(2026, 1, 1, 9, 59, 59), Level::Info, "before");
    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 0, 1), Level::Info, "after");

    let events = list_events(
        &conn,
        app.id,
        &EventFilter {
            since: Some(exact),
            until: Some(exact),
            ..default_filter()
        },
    )
    .expect("list should succeed");

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "on-boundary");
}

#[test]
fn list_events_scoped_to_application() {
    let conn = test_db();
    let a = register_application(&conn, "svc-a").expect("register should succeed");
    let b = register_application(&conn, "svc-b").expect("register should succeed");

    seed_event(&conn, a.id, ts(2026, 1, 1, 10, 0, 0), Level::Info, "for-a");
    seed_event(&conn, b.id, ts(2026, 1, 1, 10, 0, 0), Level::Info, "for-b");

    let events = list_events(&conn, a.id, &default_filter()).expect("list should succeed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "for-a");
}

// ── Statistics ───────────────────────────────────────────────────────

#[test]
fn stats_range_rejects_inverted_and_empty_windows() {
    let t = ts(2026, 1, 1, 10, 0, 0);

    let err = StatsRange::new(t, t).expect_err("since == until should fail");
    match err {
        StoreError::InvalidRange(msg) => {
            assert_eq!(msg, "since must be earlier than until")
        }
        other => panic!("unexpected error type: {other:?}"),
    }

    assert!(StatsRange::new(t + chrono::Duration::hours(1), t).is_err());
    assert!(StatsRange::new(t, t + chrono::Duration::hours(1)).is_ok());
}

#[test]
fn timeseries_buckets_by_hour() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 5, 0), Level::Info, "a");
    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 55, 0), Level::Error, "b");
    seed_event(&conn, app.id, ts(2026, 1, 1, 12, 0, 0), Level::Info, "c");

    let buckets = timeseries(
        &conn,
        app.id,
        range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 2, 0, 0, 0)),
        Interval::Hour,
        None,
    )
    .expect("timeseries should succeed");

    // The 11:00 bucket has no events and is omitted.
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].bucket_start, ts(2026, 1, 1, 10, 0, 0));
    assert_eq!(buckets[0].count, 2);
    assert_eq!(buckets[1].bucket_start, ts(2026, 1, 1, 12, 0, 0));
    assert_eq!(buckets[1].count, 1);
}

#[test]
fn timeseries_buckets_by_day() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 0, 0), Level::Info, "a");
    seed_event(&conn, app.id, ts(2026, 1, 1, 23, 59, 59), Level::Info, "b");
    seed_event(&conn, app.id, ts(2026, 1, 3, 0, 0, 0), Level::Info, "c");

    let buckets = timeseries(
        &conn,
        app.id,
        range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 4, 0, 0, 0)),
        Interval::Day,
        None,
    )
    .expect("timeseries should succeed");

    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].bucket_start, ts(2026, 1, 1, 0, 0, 0));
    assert_eq!(buckets[0].count, 2);
    assert_eq!(buckets[1].bucket_start, ts(2026, 1, 3, 0, 0, 0));
    assert_eq!(buckets[1].count, 1);
}

#[test]
fn timeseries_respects_level_filter() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 0, 0), Level::Info, "a");
    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 30, 0), Level::Error, "b");

    let buckets = timeseries(
        &conn,
        app.id,
        range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 2, 0, 0, 0)),
        Interval::Hour,
        Some(Level::Error),
    )
    .expect("timeseries should succeed");

    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].count, 1);
}

#[test]
fn by_level_orders_by_count_descending() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    for i in 0..3 {
        seed_event(&conn, app.id, ts(2026, 1, 1, 10, i, 0), Level::Error, "e");
    }
    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 10, 0), Level::Info, "i");

    let counts = by_level(
        &conn,
        app.id,
        range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 2, 0, 0, 0)),
    )
    .expect("by_level should succeed");

    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].level, Level::Error);
    assert_eq!(counts[0].count, 3);
    assert_eq!(counts[1].level, Level::Info);
    assert_eq!(counts[1].count, 1);
}

#[test]
fn timeseries_total_matches_by_level_total() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    seed_event(&conn, app.id, ts(2026, 1, 1, 9, 0, 0), Level::Debug, "a");
    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 15, 0), Level::Info, "b");
    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 45, 0), Level::Error, "c");
    seed_event(&conn, app.id, ts(2026, 1, 1, 22, 0, 0), Level::Critical, "d");
    // Outside the queried range.
    seed_event(&conn, app.id, ts(2026, 1, 2, 8, 0, 0), Level::Error, "e");

    let window = range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 1, 23, 0, 0));

    let bucket_total: i64 = timeseries(&conn, app.id, window, Interval::Hour, None)
        .expect("timeseries should succeed")
        .iter()
        .map(|b| b.count)
        .sum();
    let level_total: i64 = by_level(&conn, app.id, window)
        .expect("by_level should succeed")
        .iter()
        .map(|c| c.count)
        .sum();

    assert_eq!(bucket_total, 4);
    assert_eq!(bucket_total, level_total);
}

#[test]
fn top_messages_orders_by_count_then_recency() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    // "frequent" appears twice, "late" and "early" once each; the tie is
    // broken by the later receipt.
    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 0, 0), Level::Error, "frequent");
    seed_event(&conn, app.id, ts(2026, 1, 1, 11, 0, 0), Level::Error, "frequent");
    seed_event(&conn, app.id, ts(2026, 1, 1, 9, 0, 0), Level::Error, "early");
    seed_event(&conn, app.id, ts(2026, 1, 1, 12, 0, 0), Level::Error, "late");

    let top = top_messages(
        &conn,
        app.id,
        range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 2, 0, 0, 0)),
        10,
        None,
    )
    .expect("top_messages should succeed");

    let messages: Vec<&str> = top.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(messages, vec!["frequent", "late", "early"]);
    assert_eq!(top[0].count, 2);
    assert_eq!(top[0].last_seen, ts(2026, 1, 1, 11, 0, 0));
}

#[test]
fn top_messages_truncates_to_limit() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    for i in 0..5 {
        seed_event(&conn, app.id, ts(2026, 1, 1, 10, i, 0), Level::Info, &format!("m{i}"));
    }

    let top = top_messages(
        &conn,
        app.id,
        range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 2, 0, 0, 0)),
        2,
        None,
    )
    .expect("top_messages should succeed");
    assert_eq!(top.len(), 2);
}

#[test]
fn top_messages_respects_level_filter() {
    let conn = test_db();
    let app = register_application(&conn, "svc-a").expect("register should succeed");

    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 0, 0), Level::Error, "boom");
    seed_event(&conn, app.id, ts(2026, 1, 1, 10, 5, 0), Level::Info, "fine");

    let top = top_messages(
        &conn,
        app.id,
        range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 2, 0, 0, 0)),
        10,
        Some(Level::Error),
    )
    .expect("top_messages should succeed");

    assert_eq!(top.len(), 1);
    assert_eq!(top[0].message, "boom");
}

#[test]
fn stats_for_unknown_application_are_empty() {
    let conn = test_db();

    let window = range(ts(2026, 1, 1, 0, 0, 0), ts(2026, 1, 2, 0, 0, 0));
    assert!(timeseries(&conn, 99, window, Interval::Hour, None)
        .expect("timeseries should succeed")
        .is_empty());
    assert!(by_level(&conn, 99, window)
        .expect("by_level should succeed")
        .is_empty());
    assert!(top_messages(&conn, 99, window, 10, None)
        .expect("top_messages should succeed")
        .is_empty());
}
