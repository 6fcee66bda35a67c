mod executor;
mod pool;

pub use executor::PgExecutor;
pub use pool::Database;

use futures::future::BoxFuture;
use shift_core::error::Result;

/// Capability to run SQL against the target database.
///
/// Implementations own their connection handling; callers never hold a
/// connection across calls.
pub trait SqlExecutor: Send + Sync {
    /// Execute a single statement outside any explicit transaction.
    /// Returns the number of affected rows.
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64>>;

    /// Execute `statements` in order inside one managed transaction.
    ///
    /// Either every statement is committed or none is, provided no
    /// statement ends the transaction itself (see
    /// [`ends_transaction`](crate::migrations::ends_transaction)).
    fn execute_in_transaction<'a>(&'a self, statements: &'a [String])
        -> BoxFuture<'a, Result<()>>;
}
