use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Smallest currency unit.
    pub price: i64,
    pub description: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub product_name: Option<String>, // Joined from products, NULL if the product is gone
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Line item as stored, with both the checkout-time snapshot and the live
/// catalog join.
#[derive(Debug, Clone, FromRow)]
pub struct LineItemRow {
    pub id: i64,
    pub transaction_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub snapshot_price: Option<i64>,
    pub snapshot_name: Option<String>,
    pub catalog_price: Option<i64>,
    pub catalog_name: Option<String>,
}

impl LineItemRow {
    pub fn resolve(self, policy: PricingPolicy) -> LineItem {
        let (price, product_name) = match policy {
            PricingPolicy::Snapshot => (
                self.snapshot_price.or(self.catalog_price),
                self.snapshot_name.or(self.catalog_name),
            ),
            PricingPolicy::Live => (self.catalog_price, self.catalog_name),
        };

        LineItem {
            id: self.id,
            transaction_id: self.transaction_id,
            product_id: self.product_id,
            quantity: self.quantity,
            product_name,
            price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub id: i64,
    pub transaction_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub product_name: Option<String>,
    pub price: Option<i64>,
}

impl LineItem {
    /// Unpriced items count as zero. `None` if quantity times price overflows.
    pub fn subtotal(&self) -> Option<i64> {
        self.quantity.checked_mul(self.price.unwrap_or(0))
    }
}

/// A checkout receipt with its items and read-time total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<LineItem>,
    pub total: i64,
}

impl TransactionRecord {
    pub fn new(row: TransactionRow, items: Vec<LineItem>) -> Result<Self, AppError> {
        let total = items
            .iter()
            .try_fold(0i64, |acc, item| item.subtotal()?.checked_add(acc))
            .ok_or_else(|| {
                AppError::Validation(format!("Total of transaction {} is out of range", row.id))
            })?;

        Ok(TransactionRecord {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            items,
            total,
        })
    }
}

/// Which price history reports for a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingPolicy {
    /// Price and name captured at checkout.
    #[default]
    Snapshot,
    /// Whatever the catalog says now; deleted products are unpriced.
    Live,
}

impl std::str::FromStr for PricingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snapshot" => Ok(PricingPolicy::Snapshot),
            "live" => Ok(PricingPolicy::Live),
            other => Err(format!("unknown pricing policy '{}'", other)),
        }
    }
}

/// The acting identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authenticated(User),
    Anonymous,
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Authenticated(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn require_user(&self) -> Result<&User, AppError> {
        self.user().ok_or(AppError::Unauthorized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Completed(TransactionRecord),
    /// Nothing in the cart; nothing was written.
    EmptyCart,
}
