use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Migration discovery and ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding `<version>_<name>.<up|down>.sql` files.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Ledger table name.
    #[serde(default = "default_table")]
    pub table: String,

    /// Schema dropped and recreated before a run.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Drop and recreate `schema` before applying migrations.
    #[serde(default = "default_true")]
    pub reset_schema: bool,

    /// Retry a version whose latest attempt failed instead of treating it
    /// as applied.
    #[serde(default = "default_true")]
    pub retry_failed: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            table: default_table(),
            schema: default_schema(),
            reset_schema: true,
            retry_failed: true,
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_table() -> String {
    "migrations".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_true() -> bool {
    true
}
