use std::time::Duration;

use refdata_core::{DatabaseConfig, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::repositories::Repositories;

/// Connection pool for the reference data schema.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Opens a pool sized and timed from `config`.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        info!(max_connections = config.max_connections, "Connected to database");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded migrations in `crates/data/migrations`.
    ///
    /// # Errors
    /// Returns an error if any migration fails to apply.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Postgres-backed repositories sharing this pool.
    #[must_use]
    pub fn repositories(&self) -> Repositories {
        Repositories::postgres(self.pool.clone())
    }
}
