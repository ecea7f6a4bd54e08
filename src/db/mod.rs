pub mod models;
pub mod users;
pub mod sessions;
pub mod products;
pub mod cart;
pub mod checkout;
pub mod transactions;
pub mod seed;

pub use models::{
    CartItem, CheckoutOutcome, Identity, LineItem, PricingPolicy, Product, Session, TransactionRecord,
    User,
};
pub use users::UserRepository;
pub use sessions::SessionRepository;
pub use products::ProductRepository;
pub use cart::CartRepository;
pub use checkout::{CheckoutEngine, CheckoutLocks};
pub use transactions::TransactionRepository;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::error::AppError;

/// Open the shared store handle described by `config`.
pub async fn create_pool(config: &Config) -> Result<Pool<Sqlite>, AppError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// A private in-memory database with the schema applied.
///
/// The pool holds exactly one connection that is never recycled, since an
/// in-memory database lives and dies with its connection.
pub async fn connect_in_memory() -> Result<Pool<Sqlite>, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
