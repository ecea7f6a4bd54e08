use axum::{
    extract::State,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::db::{Identity, SessionRepository, UserRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub authenticated: bool,
    pub user_id: Option<i64>,
    pub username: Option<String>,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = UserRepository::authenticate(&state.db, req.username.trim(), &req.password)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid login. Please go back and try again.".to_string()))?;

    let session = SessionRepository::create(
        &state.db,
        &user,
        state.config.session_expiry_hours,
    ).await?;

    Ok(Json(LoginResponse {
        session_token: session.token,
        expires_at: session.expires_at,
    }))
}

/// GET /api/auth/me (anonymous allowed)
pub async fn me(Extension(identity): Extension<Identity>) -> Json<IdentityResponse> {
    let user = identity.user();

    Json(IdentityResponse {
        authenticated: user.is_some(),
        user_id: user.map(|u| u.id),
        username: user.map(|u| u.username.clone()),
    })
}
