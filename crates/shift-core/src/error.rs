use thiserror::Error;

/// Core error type for SHIFT operations.
#[derive(Error, Debug)]
pub enum ShiftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Migration version {version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },
}

impl ShiftError {
    /// Version of the migration that caused this error, if any.
    pub fn migration_version(&self) -> Option<i64> {
        match self {
            ShiftError::MigrationFailed { version, .. } => Some(*version),
            _ => None,
        }
    }
}

/// Result type alias using ShiftError.
pub type Result<T> = std::result::Result<T, ShiftError>;
