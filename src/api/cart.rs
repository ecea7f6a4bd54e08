use axum::{
    extract::State,
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{parse_id, state::AppState};
use crate::db::{CartItem, CartRepository, CheckoutOutcome, Identity, TransactionRecord};
use crate::error::AppError;

/// Raw form fields; parsed by hand so bad input becomes a validation error.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: Option<String>,
    pub quantity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub empty: bool,
    pub transaction: Option<TransactionRecord>,
}

/// GET /api/cart (requires auth)
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<CartItem>>, AppError> {
    let user = identity.require_user()?;

    Ok(Json(CartRepository::list_items(&state.db, user.id).await?))
}

/// POST /api/cart (requires auth)
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<AddToCartForm>,
) -> Result<Json<CartItem>, AppError> {
    let user = identity.require_user()?;

    let product_id = parse_id("product_id", form.product_id.as_deref())?;
    let quantity = parse_id("quantity", form.quantity.as_deref())?;

    let item = CartRepository::add_item(&state.db, user.id, product_id, quantity).await?;

    Ok(Json(item))
}

/// POST /api/cart/checkout (requires auth)
pub async fn checkout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let user = identity.require_user()?;

    let response = match state.checkout.checkout(user).await? {
        CheckoutOutcome::Completed(record) => CheckoutResponse {
            empty: false,
            transaction: Some(record),
        },
        CheckoutOutcome::EmptyCart => CheckoutResponse {
            empty: true,
            transaction: None,
        },
    };

    Ok(Json(response))
}
