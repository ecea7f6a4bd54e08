use sqlx::{Pool, Sqlite};

use crate::crypto::{hash_password, verify_password};
use crate::db::models::User;
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        username: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let password_hash = hash_password(password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (username, password_hash)
VALUES (?, ?)
RETURNING id, username, password_hash
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_username(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash FROM users WHERE username = ?"
        )
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash FROM users WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Check a username/password pair. Unknown users and wrong passwords are
    /// both `None`.
    pub async fn authenticate(
        pool: &Pool<Sqlite>,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(user) = Self::get_by_username(pool, username).await? else {
            tracing::debug!(username, "Login for unknown user");
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            tracing::debug!(user_id = user.id, "Login with wrong password");
            Ok(None)
        }
    }

    pub async fn count(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
