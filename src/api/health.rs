//! Health check endpoint

use std::path::Path;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{services::photos::uploads_writable, AppState};

const HEALTH_METADATA_KEY: &str = "last_health_check";

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DbHealth {
    /// Value read back after the health write
    pub last_updated: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub disk_writable: bool,
    pub db: DbHealth,
}

#[derive(Serialize, ToSchema)]
pub struct HealthError {
    pub status: String,
}

/// Checks that the store accepts a write and the uploads directory is writable
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Store unavailable", body = HealthError)
    )
)]
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now().to_rfc3339();
    let last_updated = match state
        .services
        .repository
        .metadata
        .touch(HEALTH_METADATA_KEY, &now)
        .await
    {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthError { status: "error".to_string() }),
            )
                .into_response();
        }
    };

    let disk_writable = uploads_writable(Path::new(&state.config.uploads.dir)).await;

    Json(HealthResponse {
        status: "ok".to_string(),
        disk_writable,
        db: DbHealth { last_updated },
    })
    .into_response()
}
