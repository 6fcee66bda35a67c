//! In-memory doubles for the ledger and SQL executor.
//!
//! Useful for exercising the runner without a database.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use shift_core::error::{Result, ShiftError};

use crate::db::SqlExecutor;
use crate::migrations::{Ledger, LedgerEntry};

/// Ledger kept in memory.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    table_ready: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing entries.
    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
            ..Default::default()
        }
    }

    /// Make every subsequent `record` call fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Whether `ensure_table` has been called.
    pub fn table_ready(&self) -> bool {
        self.table_ready.load(Ordering::SeqCst)
    }

    /// Snapshot of all recorded entries in insertion order.
    pub async fn snapshot(&self) -> Vec<LedgerEntry> {
        self.entries.read().await.clone()
    }

    fn pick_latest<'a>(
        entries: impl Iterator<Item = &'a LedgerEntry>,
    ) -> Option<LedgerEntry> {
        entries
            .max_by(|a, b| {
                a.version
                    .cmp(&b.version)
                    .then(a.created_at.cmp(&b.created_at))
            })
            .cloned()
    }
}

impl Ledger for MemoryLedger {
    fn ensure_table(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.table_ready.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn latest(&self) -> BoxFuture<'_, Result<Option<LedgerEntry>>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            Ok(Self::pick_latest(entries.iter()))
        })
    }

    fn latest_succeeded(&self) -> BoxFuture<'_, Result<Option<LedgerEntry>>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            Ok(Self::pick_latest(entries.iter().filter(|e| e.succeeded)))
        })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<LedgerEntry>>> {
        Box::pin(async move {
            let mut entries = self.entries.read().await.clone();
            entries.sort_by(|a, b| {
                a.version
                    .cmp(&b.version)
                    .then(a.created_at.cmp(&b.created_at))
            });
            Ok(entries)
        })
    }

    fn record<'a>(&'a self, entry: &'a LedgerEntry) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ShiftError::Ledger(format!(
                    "Failed to record migration version {}: ledger unavailable",
                    entry.version
                )));
            }
            self.entries.write().await.push(entry.clone());
            Ok(())
        })
    }
}

/// Executor that records statements instead of running them.
///
/// Statements containing a registered failure pattern return an error;
/// a transaction that hits one commits nothing.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    executed: Arc<RwLock<Vec<String>>>,
    committed: Arc<RwLock<Vec<Vec<String>>>>,
    attempted: Arc<RwLock<Vec<Vec<String>>>>,
    fail_patterns: Arc<RwLock<Vec<String>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `pattern`.
    pub async fn fail_on(&self, pattern: impl Into<String>) {
        self.fail_patterns.write().await.push(pattern.into());
    }

    /// Statements run through `execute`.
    pub async fn executed(&self) -> Vec<String> {
        self.executed.read().await.clone()
    }

    /// Transactions that committed, in order.
    pub async fn committed(&self) -> Vec<Vec<String>> {
        self.committed.read().await.clone()
    }

    /// Every transaction attempted, committed or not.
    pub async fn attempted(&self) -> Vec<Vec<String>> {
        self.attempted.read().await.clone()
    }

    async fn check(&self, statement: &str) -> Result<()> {
        let patterns = self.fail_patterns.read().await;
        match patterns.iter().find(|p| statement.contains(p.as_str())) {
            Some(pattern) => Err(ShiftError::Database(format!(
                "syntax error at or near \"{}\"",
                pattern
            ))),
            None => Ok(()),
        }
    }
}

impl SqlExecutor for ScriptedExecutor {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            self.check(sql).await?;
            self.executed.write().await.push(sql.to_string());
            Ok(0)
        })
    }

    fn execute_in_transaction<'a>(
        &'a self,
        statements: &'a [String],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.attempted.write().await.push(statements.to_vec());
            for statement in statements {
                self.check(statement).await?;
            }
            self.committed.write().await.push(statements.to_vec());
            Ok(())
        })
    }
}
