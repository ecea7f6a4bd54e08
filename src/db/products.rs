use sqlx::{Pool, Sqlite};

use crate::db::models::Product;
use crate::error::AppError;

pub struct ProductRepository;

impl ProductRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        name: &str,
        price: i64,
        description: &str,
    ) -> Result<Product, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
INSERT INTO products (name, price, description)
VALUES (?, ?, ?)
RETURNING id, name, price, description
            "#,
        )
        .bind(name)
        .bind(price)
        .bind(description)
        .fetch_one(pool)
        .await?;

        Ok(product)
    }

    /// All products in creation order.
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, description FROM products ORDER BY id ASC"
        )
        .fetch_all(pool)
        .await?;

        Ok(products)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, description FROM products WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(product)
    }

    pub async fn count(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
