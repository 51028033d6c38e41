//! Trigger for external schedulers

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    AppState,
};

use super::{date_or_today, CRON_KEY_HEADER};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TriggerRequest {
    /// Hotel-local day to report on; defaults to today
    pub date: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TriggerResponse {
    pub ok: bool,
    pub delivered: bool,
    pub purged: u64,
}

fn cron_key_matches(secret: &str, provided: &str) -> bool {
    constant_time_eq::constant_time_eq(secret.as_bytes(), provided.as_bytes())
}

/// Run the daily report and retention purge
#[utoipa::path(
    post,
    path = "/system/reports/daily",
    tag = "system",
    request_body(content = TriggerRequest, content_type = "application/json",
        description = "Optional; an empty body reports on today"),
    params(
        ("x-cron-key" = String, Header, description = "Shared scheduler secret")
    ),
    responses(
        (status = 200, description = "Job ran", body = TriggerResponse),
        (status = 401, description = "Wrong key", body = crate::error::ErrorResponse),
        (status = 503, description = "Trigger disabled")
    )
)]
pub async fn run_daily_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<TriggerResponse>> {
    let secret = &state.config.cron.secret;
    if secret.is_empty() {
        return Err(AppError::Unavailable(
            "Scheduled report trigger is not configured".to_string(),
        ));
    }

    let provided = headers
        .get(CRON_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !cron_key_matches(secret, provided) {
        tracing::warn!("Rejected daily report trigger with wrong key");
        return Err(AppError::Authentication("Invalid cron key".to_string()));
    }

    let request: TriggerRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    let date = date_or_today(&state, request.date.as_deref())?;
    let outcome = state.services.daily_job.run(date).await;

    Ok(Json(TriggerResponse {
        ok: true,
        delivered: outcome.delivered,
        purged: outcome.purged,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_key_must_match_exactly() {
        assert!(cron_key_matches("nightly-secret", "nightly-secret"));
        assert!(!cron_key_matches("nightly-secret", "nightly"));
        assert!(!cron_key_matches("nightly-secret", "nightly-secret "));
        assert!(!cron_key_matches("nightly-secret", ""));
    }
}
