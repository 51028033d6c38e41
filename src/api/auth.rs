//! Authentication endpoints

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::agent::AgentProfile,
    AppState,
};

use super::AuthenticatedAgent;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Numeric PIN of the agent
    pub pin: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub token: String,
    pub agent: AgentProfile,
}

/// Log in with a PIN
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "PIN missing", body = crate::error::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, AppError>,
) -> AppResult<Json<LoginResponse>> {
    let pin = request
        .pin
        .ok_or_else(|| AppError::BadRequest("PIN is required".to_string()))?;

    let (token, agent) = state.services.auth.login(&pin).await?;

    Ok(Json(LoginResponse {
        token,
        agent: AgentProfile::from(&agent),
    }))
}

/// Profile of the logged-in agent
#[utoipa::path(
    get,
    path = "/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Agent profile", body = AgentProfile),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(AuthenticatedAgent(agent): AuthenticatedAgent) -> Json<AgentProfile> {
    Json(AgentProfile::from(&agent))
}
