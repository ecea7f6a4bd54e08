//! Cart to transaction consolidation.
//!
//! A checkout reads the cart, writes one transaction row plus one line item
//! per cart row, and deletes those cart rows, all inside a single storage
//! transaction. Either every cart row is converted and removed or nothing
//! changes. Checkouts for the same user are additionally serialized so two
//! racing requests cannot both convert the same cart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::cart::CartRepository;
use crate::db::models::{CheckoutOutcome, PricingPolicy, TransactionRecord, User};
use crate::db::transactions::TransactionRepository;
use crate::error::AppError;

/// Per-user async locks held across the read-convert-clear sequence.
#[derive(Clone, Default)]
pub struct CheckoutLocks {
    // user id -> lock
    locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl CheckoutLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let user_lock = {
            let mut locks = self.locks.lock().await;
            // Drop locks nobody is holding or waiting on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(user_id).or_default().clone()
        };

        user_lock.lock_owned().await
    }

    /// Number of users with a checkout in flight.
    #[cfg(test)]
    async fn in_flight(&self) -> usize {
        let locks = self.locks.lock().await;
        locks.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}

#[derive(Clone)]
pub struct CheckoutEngine {
    pool: Pool<Sqlite>,
    locks: CheckoutLocks,
    policy: PricingPolicy,
}

impl CheckoutEngine {
    pub fn new(pool: Pool<Sqlite>, policy: PricingPolicy) -> Self {
        Self {
            pool,
            locks: CheckoutLocks::new(),
            policy,
        }
    }

    /// Convert `user`'s cart into a transaction. An empty cart is a no-op.
    pub async fn checkout(&self, user: &User) -> Result<CheckoutOutcome, AppError> {
        let _guard = self.locks.acquire(user.id).await;

        match self.convert_cart(user).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::warn!(user_id = user.id, error = %err, "Checkout rolled back");
                Err(err)
            }
        }
    }

    async fn convert_cart(&self, user: &User) -> Result<CheckoutOutcome, AppError> {
        // Dropping `tx` on any early return rolls the whole unit back
        let mut tx = self.pool.begin().await?;

        let cart = CartRepository::list_items(&mut *tx, user.id).await?;
        if cart.is_empty() {
            tx.rollback().await?;
            tracing::debug!(user_id = user.id, "Checkout with empty cart, nothing to do");
            return Ok(CheckoutOutcome::EmptyCart);
        }

        let row = TransactionRepository::create(&mut *tx, user.id, Utc::now()).await?;

        for item in &cart {
            TransactionRepository::add_line_item(&mut *tx, row.id, item).await?;

            if !CartRepository::remove_item(&mut *tx, item.id).await? {
                return Err(AppError::Internal(format!(
                    "Cart item {} disappeared during checkout",
                    item.id
                )));
            }
        }

        let items = TransactionRepository::list_line_items(&mut *tx, row.id, self.policy).await?;

        // An unrepresentable total aborts the checkout before anything is committed
        let record = TransactionRecord::new(row, items)?;

        tx.commit().await?;

        tracing::info!(
            user_id = user.id,
            transaction_id = record.id,
            line_items = record.items.len(),
            total = record.total,
            "Checkout completed"
        );

        Ok(CheckoutOutcome::Completed(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{connect_in_memory, create_pool, migrate, ProductRepository, UserRepository};

    async fn setup() -> (Pool<Sqlite>, User, CheckoutEngine) {
        let pool = connect_in_memory().await.unwrap();
        let user = UserRepository::create(&pool, "zagreus", "cerberus").await.unwrap();
        let engine = CheckoutEngine::new(pool.clone(), PricingPolicy::Snapshot);
        (pool, user, engine)
    }

    async fn count(pool: &Pool<Sqlite>, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_moves_cart_into_transaction() {
        let (pool, user, engine) = setup().await;
        let americano = ProductRepository::create(&pool, "Americano", 100, "").await.unwrap();
        let espresso = ProductRepository::create(&pool, "Espresso", 90, "").await.unwrap();

        CartRepository::add_item(&pool, user.id, americano.id, 2).await.unwrap();
        CartRepository::add_item(&pool, user.id, espresso.id, 1).await.unwrap();
        CartRepository::add_item(&pool, user.id, espresso.id, 3).await.unwrap();

        let CheckoutOutcome::Completed(record) = engine.checkout(&user).await.unwrap() else {
            panic!("expected a completed checkout");
        };

        assert_eq!(record.user_id, user.id);
        let mut lines: Vec<(i64, i64)> =
            record.items.iter().map(|i| (i.product_id, i.quantity)).collect();
        lines.sort_unstable();
        assert_eq!(
            lines,
            vec![(americano.id, 2), (espresso.id, 1), (espresso.id, 3)]
        );
        assert_eq!(record.total, 2 * 100 + 90 + 3 * 90);

        assert!(CartRepository::list_items(&pool, user.id).await.unwrap().is_empty());
        let history = TransactionRepository::list_for_user(&pool, user.id, PricingPolicy::Snapshot)
            .await
            .unwrap();
        assert_eq!(history, vec![record]);
    }

    #[tokio::test]
    async fn test_empty_cart_is_noop() {
        let (pool, user, engine) = setup().await;

        assert_eq!(engine.checkout(&user).await.unwrap(), CheckoutOutcome::EmptyCart);
        assert_eq!(engine.checkout(&user).await.unwrap(), CheckoutOutcome::EmptyCart);
        assert_eq!(count(&pool, "transactions").await, 0);
    }

    #[tokio::test]
    async fn test_other_users_cart_untouched() {
        let (pool, user, engine) = setup().await;
        let other = UserRepository::create(&pool, "melinoe", "b4d3ec1").await.unwrap();

        CartRepository::add_item(&pool, user.id, 1, 1).await.unwrap();
        CartRepository::add_item(&pool, other.id, 1, 4).await.unwrap();

        engine.checkout(&user).await.unwrap();

        let remaining = CartRepository::list_items(&pool, other.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_failure_mid_checkout_rolls_back_everything() {
        let (pool, user, engine) = setup().await;
        let espresso = ProductRepository::create(&pool, "Espresso", 90, "").await.unwrap();

        // Any line item for product 666 fails to insert
        sqlx::query(
            r#"
CREATE TRIGGER fail_line_item BEFORE INSERT ON line_items
WHEN NEW.product_id = 666
BEGIN
    SELECT RAISE(ABORT, 'injected storage failure');
END
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        CartRepository::add_item(&pool, user.id, espresso.id, 2).await.unwrap();
        CartRepository::add_item(&pool, user.id, 666, 1).await.unwrap();

        let err = engine.checkout(&user).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        assert_eq!(count(&pool, "transactions").await, 0);
        assert_eq!(count(&pool, "line_items").await, 0);
        assert_eq!(CartRepository::list_items(&pool, user.id).await.unwrap().len(), 2);

        // Once the fault is gone the same cart checks out in full
        sqlx::query("DROP TRIGGER fail_line_item").execute(&pool).await.unwrap();
        assert!(matches!(
            engine.checkout(&user).await.unwrap(),
            CheckoutOutcome::Completed(ref r) if r.items.len() == 2
        ));
        assert!(CartRepository::list_items(&pool, user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_convert_cart_once() {
        let (pool, user, engine) = setup().await;
        CartRepository::add_item(&pool, user.id, 1, 2).await.unwrap();
        CartRepository::add_item(&pool, user.id, 2, 1).await.unwrap();

        let (a, b) = tokio::join!(engine.checkout(&user), engine.checkout(&user));
        let outcomes = [a.unwrap(), b.unwrap()];

        let completed = outcomes
            .iter()
            .filter(|o| matches!(o, CheckoutOutcome::Completed(_)))
            .count();
        assert_eq!(completed, 1);
        assert!(outcomes.contains(&CheckoutOutcome::EmptyCart));
        assert_eq!(count(&pool, "transactions").await, 1);
        assert_eq!(count(&pool, "line_items").await, 2);
    }

    #[tokio::test]
    async fn test_unrepresentable_total_rolls_back() {
        let (pool, user, engine) = setup().await;
        let espresso = ProductRepository::create(&pool, "Espresso", 90, "").await.unwrap();

        // Written directly, the way a row from an older build could look
        sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES (?, ?, ?)")
            .bind(user.id)
            .bind(espresso.id)
            .bind(i64::MAX / 10)
            .execute(&pool)
            .await
            .unwrap();

        let err = engine.checkout(&user).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(count(&pool, "transactions").await, 0);
        assert_eq!(count(&pool, "line_items").await, 0);
        let cart = CartRepository::list_items(&pool, user.id).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, i64::MAX / 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_checkouts_on_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_url: format!("sqlite://{}", dir.path().join("race.db").display()),
            db_max_connections: 8,
            ..Config::default()
        };
        let pool = create_pool(&config).await.unwrap();
        migrate(&pool).await.unwrap();

        let user = UserRepository::create(&pool, "zagreus", "cerberus").await.unwrap();
        let product = ProductRepository::create(&pool, "Espresso", 90, "").await.unwrap();
        let engine = CheckoutEngine::new(pool.clone(), PricingPolicy::Snapshot);

        const ROUNDS: i64 = 5;
        const RACERS: usize = 8;

        for round in 1..=ROUNDS {
            CartRepository::add_item(&pool, user.id, product.id, 2).await.unwrap();
            CartRepository::add_item(&pool, user.id, product.id, 1).await.unwrap();

            let handles: Vec<_> = (0..RACERS)
                .map(|_| {
                    let engine = engine.clone();
                    let user = user.clone();
                    tokio::spawn(async move { engine.checkout(&user).await })
                })
                .collect();

            let mut completed = 0;
            let mut empty = 0;
            for handle in handles {
                match handle.await.unwrap().unwrap() {
                    CheckoutOutcome::Completed(record) => {
                        assert_eq!(record.items.len(), 2);
                        assert_eq!(record.total, 270);
                        completed += 1;
                    }
                    CheckoutOutcome::EmptyCart => empty += 1,
                }
            }

            assert_eq!(completed, 1, "round {}", round);
            assert_eq!(empty, RACERS - 1, "round {}", round);
            assert_eq!(count(&pool, "transactions").await, round);
            assert_eq!(count(&pool, "line_items").await, 2 * round);
            assert!(CartRepository::list_items(&pool, user.id).await.unwrap().is_empty());
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn test_locks_are_released() {
        let locks = CheckoutLocks::new();

        let guard = locks.acquire(1).await;
        assert_eq!(locks.in_flight().await, 1);
        drop(guard);
        assert_eq!(locks.in_flight().await, 0);

        // Re-acquiring after release must not deadlock
        let _again = locks.acquire(1).await;
    }
}
