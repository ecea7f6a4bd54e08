use chrono::{TimeDelta, Utc};

use crate::db::PricingPolicy;
use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    /// `None` means sessions never expire.
    pub session_expiry_hours: Option<i64>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub pricing_policy: PricingPolicy,
    pub seed_demo_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            database_url: "sqlite://cafe.db?mode=rwc".to_string(),
            session_expiry_hours: None,
            db_max_connections: 10,
            db_min_connections: 1,
            request_timeout_secs: 30,
            pricing_policy: PricingPolicy::Snapshot,
            seed_demo_data: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    /// for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let session_expiry_hours = match lookup("SESSION_EXPIRY_HOURS") {
            Some(raw) if !raw.trim().is_empty() => {
                let hours: i64 = parse_var("SESSION_EXPIRY_HOURS", &raw)?;
                if hours <= 0 {
                    return Err(AppError::Config(
                        "Invalid SESSION_EXPIRY_HOURS: must be positive".to_string(),
                    ));
                }
                // Must still produce a valid expiry date when added to now
                let expires_at = TimeDelta::try_hours(hours)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
                if expires_at.is_none() {
                    return Err(AppError::Config(format!(
                        "Invalid SESSION_EXPIRY_HOURS: {} hours is out of range",
                        hours
                    )));
                }
                Some(hours)
            }
            _ => None,
        };

        Ok(Config {
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: lookup("SERVER_PORT")
                .map(|v| parse_var("SERVER_PORT", &v))
                .transpose()?
                .unwrap_or(defaults.server_port),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            session_expiry_hours,
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .map(|v| parse_var("DB_MAX_CONNECTIONS", &v))
                .transpose()?
                .unwrap_or(defaults.db_max_connections),
            db_min_connections: lookup("DB_MIN_CONNECTIONS")
                .map(|v| parse_var("DB_MIN_CONNECTIONS", &v))
                .transpose()?
                .unwrap_or(defaults.db_min_connections),
            request_timeout_secs: lookup("REQUEST_TIMEOUT_SECS")
                .map(|v| parse_var("REQUEST_TIMEOUT_SECS", &v))
                .transpose()?
                .unwrap_or(defaults.request_timeout_secs),
            pricing_policy: lookup("PRICING_POLICY")
                .map(|v| parse_var("PRICING_POLICY", &v))
                .transpose()?
                .unwrap_or(defaults.pricing_policy),
            seed_demo_data: lookup("SEED_DEMO_DATA")
                .map(|v| parse_var("SEED_DEMO_DATA", &v))
                .transpose()?
                .unwrap_or(defaults.seed_demo_data),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}
