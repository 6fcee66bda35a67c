//! The migration ledger: an append-only table of every migration attempt.

use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::PgPool;
use tracing::debug;

use shift_core::config::is_valid_identifier;
use shift_core::error::{Result, ShiftError};

use super::file::Direction;

/// One recorded migration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub version: i64,
    pub succeeded: bool,
    /// Nanoseconds since the Unix epoch.
    pub created_at: i64,
    pub direction: Direction,
}

impl LedgerEntry {
    /// An attempt made now.
    pub fn attempt(version: i64, direction: Direction, succeeded: bool) -> Self {
        Self {
            version,
            succeeded,
            created_at: now_nanos(),
            direction,
        }
    }
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Persistent record of migration attempts.
///
/// Rows are only ever appended.
pub trait Ledger: Send + Sync {
    /// Create the ledger table and its version index if missing.
    fn ensure_table(&self) -> BoxFuture<'_, Result<()>>;

    /// The entry with the highest version, if any.
    fn latest(&self) -> BoxFuture<'_, Result<Option<LedgerEntry>>>;

    /// The succeeded entry with the highest version, if any.
    fn latest_succeeded(&self) -> BoxFuture<'_, Result<Option<LedgerEntry>>>;

    /// All entries ordered by version, then attempt time.
    fn entries(&self) -> BoxFuture<'_, Result<Vec<LedgerEntry>>>;

    /// Append one entry.
    fn record<'a>(&'a self, entry: &'a LedgerEntry) -> BoxFuture<'a, Result<()>>;
}

type LedgerRow = (i64, bool, i64, String);

fn entry_from_row((version, succeeded, created_at, direction): LedgerRow) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
        version,
        succeeded,
        created_at,
        direction: direction.parse()?,
    })
}

/// Ledger stored in a PostgreSQL table.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
    table: String,
}

impl PgLedger {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_valid_identifier(&table) {
            return Err(ShiftError::Validation(format!(
                "Invalid ledger table name '{}'",
                table
            )));
        }
        Ok(Self { pool, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn fetch_one(&self, sql: String, what: &str) -> Result<Option<LedgerEntry>> {
        let row: Option<LedgerRow> = sqlx::query_as(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ShiftError::Ledger(format!("Failed to read {}: {}", what, e)))?;

        row.map(entry_from_row).transpose()
    }
}

impl Ledger for PgLedger {
    fn ensure_table(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    version BIGINT NOT NULL,
                    succeeded BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at BIGINT NOT NULL,
                    direction VARCHAR NOT NULL
                )
                "#,
                table = self.table
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| ShiftError::Ledger(format!("Failed to create ledger table: {}", e)))?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {table}_version_idx ON {table} (version)",
                table = self.table
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| ShiftError::Ledger(format!("Failed to create ledger index: {}", e)))?;

            debug!(table = %self.table, "Ledger table ready");
            Ok(())
        })
    }

    fn latest(&self) -> BoxFuture<'_, Result<Option<LedgerEntry>>> {
        Box::pin(async move {
            let sql = format!(
                r#"
                SELECT version, succeeded, created_at, direction
                FROM {}
                ORDER BY version DESC, created_at DESC
                LIMIT 1
                "#,
                self.table
            );
            self.fetch_one(sql, "latest ledger entry").await
        })
    }

    fn latest_succeeded(&self) -> BoxFuture<'_, Result<Option<LedgerEntry>>> {
        Box::pin(async move {
            let sql = format!(
                r#"
                SELECT version, succeeded, created_at, direction
                FROM {}
                WHERE succeeded
                ORDER BY version DESC, created_at DESC
                LIMIT 1
                "#,
                self.table
            );
            self.fetch_one(sql, "latest succeeded ledger entry").await
        })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<LedgerEntry>>> {
        Box::pin(async move {
            let sql = format!(
                r#"
                SELECT version, succeeded, created_at, direction
                FROM {}
                ORDER BY version ASC, created_at ASC
                "#,
                self.table
            );
            let rows: Vec<LedgerRow> = sqlx::query_as(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ShiftError::Ledger(format!("Failed to read ledger: {}", e)))?;

            rows.into_iter().map(entry_from_row).collect()
        })
    }

    fn record<'a>(&'a self, entry: &'a LedgerEntry) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            sqlx::query(&format!(
                "INSERT INTO {} (version, succeeded, created_at, direction) VALUES ($1, $2, $3, $4)",
                self.table
            ))
            .bind(entry.version)
            .bind(entry.succeeded)
            .bind(entry.created_at)
            .bind(entry.direction.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                ShiftError::Ledger(format!(
                    "Failed to record migration version {}: {}",
                    entry.version, e
                ))
            })?;
            Ok(())
        })
    }
}
