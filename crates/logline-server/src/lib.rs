//! Logline server library logic.
//!
//! Builds the axum router over the access layer: application registration
//! and lookup, credential-checked event ingestion, filtered event listing,
//! and the three statistics views. Handlers validate input, run store
//! operations on the blocking pool, and map tagged store errors to HTTP
//! statuses with a uniform error body.

pub mod api;
pub mod api_apps;
pub mod api_events;
pub mod api_stats;
pub mod config;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use logline_db::DbPool;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
///
/// Requests share nothing but the connection pool; all concurrency control
/// lives in the store's transactional guarantees.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
///
/// The `{id}` segment doubles as the application name for registration
/// (`POST /apps/{name}`); the router requires one parameter name per
/// position across overlapping routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/apps", get(api_apps::list_applications_handler))
        .route(
            "/apps/{id}",
            post(api_apps::register_application_handler).get(api_apps::get_application_handler),
        )
        .route(
            "/apps/{id}/events",
            get(api_events::list_events_handler).post(api_events::ingest_event_handler),
        )
        .route(
            "/apps/{id}/stats/timeseries",
            get(api_stats::timeseries_handler),
        )
        .route("/apps/{id}/stats/by-level", get(api_stats::by_level_handler))
        .route(
            "/apps/{id}/stats/top-messages",
            get(api_stats::top_messages_handler),
        )
        .layer(Extension(Arc::new(state)))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
