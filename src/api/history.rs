use axum::{
    extract::State,
    Extension, Json,
};

use crate::api::state::AppState;
use crate::db::{Identity, TransactionRecord, TransactionRepository};
use crate::error::AppError;

/// GET /api/transactions (requires auth)
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let user = identity.require_user()?;

    let history = TransactionRepository::list_for_user(
        &state.db,
        user.id,
        state.config.pricing_policy,
    ).await?;

    Ok(Json(history))
}
