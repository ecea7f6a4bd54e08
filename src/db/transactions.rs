use chrono::{DateTime, Utc};
use sqlx::{Executor, Pool, Sqlite};

use crate::db::models::{CartItem, LineItem, LineItemRow, PricingPolicy, TransactionRecord, TransactionRow};
use crate::error::AppError;

pub struct TransactionRepository;

impl TransactionRepository {
    pub async fn create<'e, E>(
        executor: E,
        user_id: i64,
        created_at: DateTime<Utc>,
    ) -> Result<TransactionRow, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
INSERT INTO transactions (user_id, created_at)
VALUES (?, ?)
RETURNING id, user_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(created_at)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Record one purchased cart row, snapshotting the catalog price and name
    /// as they are right now. Missing products snapshot as NULL.
    pub async fn add_line_item<'e, E>(
        executor: E,
        transaction_id: i64,
        item: &CartItem,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO line_items (transaction_id, product_id, quantity, unit_price, product_name)
VALUES (
    ?, ?, ?,
    (SELECT price FROM products WHERE id = ?),
    (SELECT name FROM products WHERE id = ?)
)
RETURNING id
            "#,
        )
        .bind(transaction_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.product_id)
        .bind(item.product_id)
        .fetch_one(executor)
        .await?;

        Ok(id)
    }

    pub async fn list_line_items<'e, E>(
        executor: E,
        transaction_id: i64,
        policy: PricingPolicy,
    ) -> Result<Vec<LineItem>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
SELECT l.id, l.transaction_id, l.product_id, l.quantity,
       l.unit_price AS snapshot_price, l.product_name AS snapshot_name,
       p.price AS catalog_price, p.name AS catalog_name
FROM line_items l
LEFT JOIN products p ON p.id = l.product_id
WHERE l.transaction_id = ?
ORDER BY l.id ASC
            "#
        )
        .bind(transaction_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(|row| row.resolve(policy)).collect())
    }

    /// A user's history, most recent first, each with its items and total.
    /// A total that does not fit in an `i64` is a validation error.
    pub async fn list_for_user(
        pool: &Pool<Sqlite>,
        user_id: i64,
        policy: PricingPolicy,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, created_at FROM transactions WHERE user_id = ? ORDER BY id DESC"
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let items = Self::list_line_items(pool, row.id, policy).await?;
            records.push(TransactionRecord::new(row, items)?);
        }

        Ok(records)
    }
}
