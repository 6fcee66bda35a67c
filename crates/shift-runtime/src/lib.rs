//! Migration engine for SHIFT: file discovery, the ledger, and the runner.

pub mod db;
pub mod migrations;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use db::{Database, PgExecutor, SqlExecutor};
pub use migrations::{MigrationRunner, PgLedger, RunReport, SchemaBootstrapper};
