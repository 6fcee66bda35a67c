mod bootstrap;
mod file;
mod ledger;
mod runner;
mod scanner;
mod sql;

pub use bootstrap::SchemaBootstrapper;
pub use file::{Direction, MigrationFile};
pub use ledger::{Ledger, LedgerEntry, PgLedger};
pub use runner::{MigrationRunner, MigrationStatus, RunPhase, RunReport};
pub use scanner::{scan, MigrationFiles};
pub use sql::{ends_transaction, is_transaction_control, split_statements};
