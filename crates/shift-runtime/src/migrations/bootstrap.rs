//! Dropping and recreating the target schema before a run.

use std::sync::Arc;

use tracing::info;

use shift_core::config::is_valid_identifier;
use shift_core::error::{Result, ShiftError};

use crate::db::SqlExecutor;

/// Drops and recreates the target schema before a run.
pub struct SchemaBootstrapper {
    executor: Arc<dyn SqlExecutor>,
    schema: String,
}

impl SchemaBootstrapper {
    pub fn new(executor: Arc<dyn SqlExecutor>, schema: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        if !is_valid_identifier(&schema) {
            return Err(ShiftError::Validation(format!(
                "Invalid schema name '{}'",
                schema
            )));
        }
        Ok(Self { executor, schema })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Drop the schema with everything in it, then create it empty.
    pub async fn reset(&self) -> Result<()> {
        self.executor
            .execute(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", self.schema))
            .await
            .map_err(|e| {
                ShiftError::Database(format!("Failed to drop schema {}: {}", self.schema, e))
            })?;
        info!("{} schema dropped", self.schema);

        self.executor
            .execute(&format!("CREATE SCHEMA \"{}\"", self.schema))
            .await
            .map_err(|e| {
                ShiftError::Database(format!("Failed to create schema {}: {}", self.schema, e))
            })?;
        info!("{} schema created", self.schema);

        Ok(())
    }
}
