use chrono::{Duration, Utc};
use sqlx::{Pool, Sqlite};

use crate::crypto::generate_session_token;
use crate::db::models::{Identity, Session, User};
use crate::db::users::UserRepository;
use crate::error::AppError;

pub struct SessionRepository;

impl SessionRepository {
    /// Open a new session for `user`. Without an expiry the session lives
    /// forever. An expiry past the representable date range is a config error.
    pub async fn create(
        pool: &Pool<Sqlite>,
        user: &User,
        expiry_hours: Option<i64>,
    ) -> Result<Session, AppError> {
        let token = generate_session_token();
        let created_at = Utc::now();
        let expires_at = expiry_hours
            .map(|hours| {
                Duration::try_hours(hours)
                    .and_then(|lifetime| created_at.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AppError::Config(format!("Session expiry of {} hours is out of range", hours))
                    })
            })
            .transpose()?;

        let session = sqlx::query_as::<_, Session>(
            r#"
INSERT INTO sessions (token, user_id, created_at, expires_at)
VALUES (?, ?, ?, ?)
RETURNING token, user_id, created_at, expires_at
            "#,
        )
        .bind(&token)
        .bind(user.id)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(pool)
        .await?;

        tracing::debug!(user_id = user.id, "Session created");
        Ok(session)
    }

    /// Fetch a session that has not expired.
    pub async fn get_by_token(
        pool: &Pool<Sqlite>,
        token: &str,
    ) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?"
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        let now = Utc::now();
        Ok(session.filter(|s| !s.is_expired_at(now)))
    }

    /// Resolve a token into the acting identity. Missing, unknown and expired
    /// tokens are anonymous, not errors.
    pub async fn resolve(
        pool: &Pool<Sqlite>,
        token: Option<&str>,
    ) -> Result<Identity, AppError> {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(Identity::Anonymous),
        };

        let Some(session) = Self::get_by_token(pool, token).await? else {
            return Ok(Identity::Anonymous);
        };

        // sessions.user_id is advisory; a vanished user is just anonymous
        let identity = match UserRepository::get_by_id(pool, session.user_id).await? {
            Some(user) => Identity::Authenticated(user),
            None => Identity::Anonymous,
        };

        Ok(identity)
    }
}
