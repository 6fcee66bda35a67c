use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use shift_core::config::ShiftConfig;
use shift_core::error::{Result, ShiftError};

/// Database connection wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection from configuration.
    ///
    /// Every pooled connection uses the migrations schema as its
    /// `search_path`.
    pub async fn from_config(config: &ShiftConfig) -> Result<Self> {
        let options = config.connect_options()?;
        let schema = &config.migrations.schema;
        let config = &config.database;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| ShiftError::Database(format!("Failed to connect: {}", e)))?;

        debug!(
            host = %config.host,
            dbname = %config.dbname,
            schema = %schema,
            pool_size = config.pool_size,
            "Database pool ready"
        );

        Ok(Self { pool })
    }

    /// Get the pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ShiftError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shift_core::config::DatabaseConfig;

    #[tokio::test]
    async fn test_from_config_rejects_bad_sslmode() {
        let config = ShiftConfig {
            database: DatabaseConfig {
                dbname: "shift".to_string(),
                sslmode: "bogus".to_string(),
                ..Default::default()
            },
            migrations: Default::default(),
            logging: Default::default(),
        };

        let result = Database::from_config(&config).await;
        assert!(matches!(result, Err(ShiftError::Config(_))));
    }
}
