use sqlx::{Pool, Sqlite};

use crate::db::products::ProductRepository;
use crate::db::users::UserRepository;
use crate::error::AppError;

pub const DEMO_USERS: &[(&str, &str)] = &[("zagreus", "cerberus"), ("melinoe", "b4d3ec1")];

pub const DEMO_PRODUCTS: &[(&str, i64, &str)] = &[
    ("Americano", 100, "Espresso, diluted for a lighter experience"),
    ("Cappuccino", 110, "Espresso with steamed milk"),
    ("Espresso", 90, "A strong shot of coffee"),
    ("Macchiato", 120, "Espresso with a small amount of milk"),
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub products: usize,
}

/// Insert the demo users and products into empty tables. Tables that already
/// hold rows are left alone.
pub async fn seed_if_empty(pool: &Pool<Sqlite>) -> Result<SeedReport, AppError> {
    let mut report = SeedReport::default();

    if UserRepository::count(pool).await? == 0 {
        for (username, password) in DEMO_USERS {
            UserRepository::create(pool, username, password).await?;
            report.users += 1;
        }
    }

    if ProductRepository::count(pool).await? == 0 {
        for (name, price, description) in DEMO_PRODUCTS {
            ProductRepository::create(pool, name, *price, description).await?;
            report.products += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_seed_once() {
        let pool = connect_in_memory().await.unwrap();

        let first = seed_if_empty(&pool).await.unwrap();
        assert_eq!(first, SeedReport { users: 2, products: 4 });

        let second = seed_if_empty(&pool).await.unwrap();
        assert_eq!(second, SeedReport::default());

        let espresso = ProductRepository::get_by_id(&pool, 3).await.unwrap().unwrap();
        assert_eq!((espresso.name.as_str(), espresso.price), ("Espresso", 90));
    }
}
