use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;
use crate::db::SessionRepository;
use crate::error::AppError;

/// Pull the token out of `Authorization: Bearer <token>`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Session middleware - resolves the caller's identity on every request.
/// Requests without a valid session continue as anonymous.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).map(str::to_owned);
    let identity = SessionRepository::resolve(&state.db, token.as_deref()).await?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
