//! Application registry handlers.

use crate::api::{parse_app_id, run_blocking, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use logline_store::Application;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response body for successful registration. The only place the ingest
/// credential ever appears in a response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterApplicationResponse {
    /// The assigned application id.
    pub id: i64,
    /// The registered name.
    pub name: String,
    /// The generated ingest credential (32 hex chars).
    pub ingest_credential: String,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Response body for application reads. Excludes the credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Application> for ApplicationResponse {
    fn from(app: Application) -> Self {
        Self {
            id: app.id,
            name: app.name,
            created_at: app.created_at,
        }
    }
}

/// Handler for `POST /apps/{name}`.
///
/// The path parameter is the application name to register.
pub async fn register_application_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<RegisterApplicationResponse>), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation(
            "application name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > 255 {
        return Err(ApiError::Validation(
            "application name must be at most 255 characters".to_string(),
        ));
    }

    let app = run_blocking(state, move |conn| {
        logline_store::register_application(conn, &name).map_err(ApiError::from)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterApplicationResponse {
            id: app.id,
            name: app.name,
            ingest_credential: app.ingest_credential,
            created_at: app.created_at,
        }),
    ))
}

/// Handler for `GET /apps/{id}`.
pub async fn get_application_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApplicationResponse>, ApiError> {
    let id = parse_app_id(&raw_id)?;

    let app = run_blocking(state, move |conn| {
        logline_store::get_application(conn, id).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(app.into()))
}

/// Handler for `GET /apps`.
pub async fn list_applications_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<ApplicationResponse>>, ApiError> {
    let apps = run_blocking(state, |conn| {
        logline_store::list_applications(conn).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(apps.into_iter().map(Into::into).collect()))
}
