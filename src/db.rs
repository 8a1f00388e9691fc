//! Postgres connectivity for the consultation service.

use crate::config::Config;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Owns the connection pool shared by the company cache, the consultation
/// audit trail and the cooldown queries.
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Opens the pool sized from [`Config::db_max_connections`] and pings
    /// the server before any traffic is served.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }
}
