//! Running migration SQL on a PostgreSQL pool.

use futures::future::BoxFuture;
use sqlx::PgPool;
use tracing::trace;

use shift_core::error::{Result, ShiftError};

use super::SqlExecutor;

/// PostgreSQL-backed [`SqlExecutor`].
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SqlExecutor for PgExecutor {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            trace!(sql, "Executing statement");
            let result = sqlx::query(sql).execute(&self.pool).await?;
            Ok(result.rows_affected())
        })
    }

    fn execute_in_transaction<'a>(
        &'a self,
        statements: &'a [String],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            for (idx, statement) in statements.iter().enumerate() {
                trace!(statement = idx + 1, sql = %statement, "Executing statement");
                // Dropping `tx` on error rolls the transaction back.
                sqlx::query(statement.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        ShiftError::Database(format!("statement {} failed: {}", idx + 1, e))
                    })?;
            }

            tx.commit().await?;
            Ok(())
        })
    }
}
