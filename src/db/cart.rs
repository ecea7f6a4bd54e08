use sqlx::{Executor, Pool, Sqlite};

use crate::db::models::CartItem;
use crate::error::AppError;

/// Largest quantity a single cart row may carry.
pub const MAX_CART_QUANTITY: i64 = 10_000;

pub struct CartRepository;

impl CartRepository {
    /// Append a cart row. Adding the same product twice yields two rows, and
    /// the product id is not checked against the catalog.
    pub async fn add_item(
        pool: &Pool<Sqlite>,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<CartItem, AppError> {
        if quantity <= 0 {
            return Err(AppError::Validation(format!(
                "Quantity must be a positive integer, got {}",
                quantity
            )));
        }
        if quantity > MAX_CART_QUANTITY {
            return Err(AppError::Validation(format!(
                "Quantity must be at most {}, got {}",
                MAX_CART_QUANTITY, quantity
            )));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO cart_items (user_id, product_id, quantity)
VALUES (?, ?, ?)
RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(pool)
        .await?;

        // Fetch with product name joined
        let item = Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created cart item".to_string()))?;

        Ok(item)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<CartItem>, AppError> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"
SELECT c.id, c.user_id, c.product_id, c.quantity, p.name AS product_name
FROM cart_items c
LEFT JOIN products p ON p.id = c.product_id
WHERE c.id = ?
            "#
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(item)
    }

    /// The user's cart. Orphaned rows come back with no product name.
    pub async fn list_items<'e, E>(executor: E, user_id: i64) -> Result<Vec<CartItem>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let items = sqlx::query_as::<_, CartItem>(
            r#"
SELECT c.id, c.user_id, c.product_id, c.quantity, p.name AS product_name
FROM cart_items c
LEFT JOIN products p ON p.id = c.product_id
WHERE c.user_id = ?
ORDER BY c.id ASC
            "#
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    /// Returns whether a row was actually removed.
    pub async fn remove_item<'e, E>(executor: E, cart_item_id: i64) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?")
            .bind(cart_item_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
