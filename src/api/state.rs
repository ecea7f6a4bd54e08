use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use crate::config::Config;
use crate::db::CheckoutEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub checkout: CheckoutEngine,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: Arc<Config>) -> Self {
        let checkout = CheckoutEngine::new(db.clone(), config.pricing_policy);
        Self { db, checkout, config }
    }
}
