pub mod auth;
pub mod cart;
pub mod catalog;
pub mod history;
pub mod state;
pub mod middleware;

pub use state::AppState;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    trace::TraceLayer,
    timeout::TimeoutLayer,
};
use std::time::Duration;
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Health check
        .route("/api/health", get(health))

        // Identity
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))

        // Catalog
        .route("/api/products", get(catalog::list_products))
        .route("/api/products/{id}", get(catalog::get_product))

        // Cart and checkout
        .route("/api/cart", get(cart::get_cart).post(cart::add_to_cart))
        .route("/api/cart/checkout", post(cart::checkout))

        // History
        .route("/api/transactions", get(history::list_transactions))

        // Resolve the session on every request; anonymous is allowed through
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Parse a positive integer form field. Missing, non-numeric and
/// non-positive values are validation errors.
pub(crate) fn parse_id(field: &str, raw: Option<&str>) -> Result<i64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("Missing {}", field)))?;

    let value: i64 = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("{} must be a number, got '{}'", field, raw)))?;

    if value <= 0 {
        return Err(AppError::Validation(format!("{} must be positive", field)));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("quantity", Some(" 2 ")).unwrap(), 2);

        for raw in [None, Some(""), Some("two"), Some("0"), Some("-1"), Some("1.5")] {
            assert!(
                matches!(parse_id("quantity", raw), Err(AppError::Validation(_))),
                "{:?} should be rejected",
                raw
            );
        }
    }
}
