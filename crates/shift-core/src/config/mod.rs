mod database;
mod logging;
mod migrations;

pub use database::DatabaseConfig;
pub use logging::LoggingConfig;
pub use migrations::MigrationsConfig;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, ShiftError};

/// Environment variable selecting `config/<ENV>.*`.
pub const ENV_VAR: &str = "ENV";

/// Environment used when `ENV` is unset.
pub const DEFAULT_ENV: &str = "development";

const CONFIG_EXTENSIONS: [&str; 3] = ["toml", "yml", "yaml"];

static ENV_PLACEHOLDER: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern is valid")
});

static IDENTIFIER: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// Root configuration for SHIFT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftConfig {
    /// Database configuration.
    pub database: DatabaseConfig,

    /// Migration configuration.
    #[serde(default)]
    pub migrations: MigrationsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from a file extension. Unknown extensions are TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        }
    }
}

impl ShiftConfig {
    /// Load configuration from a TOML or YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShiftError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        match ConfigFormat::from_path(path) {
            ConfigFormat::Toml => Self::parse_toml(&content),
            ConfigFormat::Yaml => Self::parse_yaml(&content),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| ShiftError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Parse configuration from a YAML string.
    pub fn parse_yaml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        serde_yaml::from_str(&content)
            .map_err(|e| ShiftError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Locate `<dir>/<env>.toml`, `<dir>/<env>.yml` or `<dir>/<env>.yaml`.
    pub fn discover(dir: impl AsRef<Path>, env: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        for ext in CONFIG_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", env, ext));
            if candidate.is_file() {
                debug!("Using config file {}", candidate.display());
                return Ok(candidate);
            }
        }

        Err(ShiftError::Config(format!(
            "No configuration for environment '{}' in {} (expected {}.toml, {}.yml or {}.yaml)",
            env,
            dir.display(),
            env,
            env,
            env
        )))
    }

    /// Load the configuration selected by the `ENV` variable from `dir`.
    pub fn from_env_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let env = std::env::var(ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENV.to_string());

        let path = Self::discover(dir, &env)?;
        Self::from_file(path)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;

        if !is_valid_identifier(&self.migrations.table) {
            return Err(ShiftError::Validation(format!(
                "Invalid ledger table name '{}'",
                self.migrations.table
            )));
        }
        if !is_valid_identifier(&self.migrations.schema) {
            return Err(ShiftError::Validation(format!(
                "Invalid schema name '{}'",
                self.migrations.schema
            )));
        }

        Ok(())
    }

    /// Driver connection options with `search_path` pinned to the
    /// migrations schema, so the ledger table and unqualified names in
    /// migration files land in the schema the bootstrapper resets.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        let search_path = format!("\"{}\"", self.migrations.schema);
        Ok(self
            .database
            .connect_options()?
            .options([("search_path", search_path.as_str())]))
    }
}

/// Whether `name` is a plain, unquoted-safe SQL identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    for cap in ENV_PLACEHOLDER.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [database]
            dbname = "app"
        "#;

        let config = ShiftConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.dbname, "app");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.migrations.table, "migrations");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [database]
            host = "10.0.0.5"
            port = 5433
            user = "deploy"
            password = "hunter2"
            dbname = "inventory"
            sslmode = "require"

            [migrations]
            dir = "sql"
            table = "schema_ledger"
            schema = "app"
            reset_schema = false

            [logging]
            level = "debug"
        "#;

        let config = ShiftConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.user, "deploy");
        assert_eq!(config.migrations.table, "schema_ledger");
        assert!(!config.migrations.reset_schema);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
database:
  host: localhost
  port: 5432
  user: postgres
  password: postgres
  dbname: shift_dev
  sslmode: disable
"#;

        let config = ShiftConfig::parse_yaml(yaml).unwrap();
        assert_eq!(config.database.dbname, "shift_dev");
        assert_eq!(config.database.sslmode, "disable");
        assert!(config.migrations.retry_failed);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SHIFT_TEST_DB_PASSWORD", "s3cret");

        let toml = r#"
            [database]
            dbname = "app"
            password = "${SHIFT_TEST_DB_PASSWORD}"
        "#;

        let config = ShiftConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.password, "s3cret");

        std::env::remove_var("SHIFT_TEST_DB_PASSWORD");
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        let toml = r#"
            [database]
            dbname = "app"

            [migrations]
            table = "migrations; DROP TABLE users"
        "#;

        let config = ShiftConfig::parse_toml(toml).unwrap();
        assert!(matches!(config.validate(), Err(ShiftError::Validation(_))));

        assert!(is_valid_identifier("public"));
        assert!(is_valid_identifier("_ledger2"));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("my-schema"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_discover_prefers_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("staging.yml"), "database:\n  dbname: a\n").unwrap();
        fs::write(dir.path().join("staging.toml"), "[database]\ndbname = \"b\"\n").unwrap();

        let path = ShiftConfig::discover(dir.path(), "staging").unwrap();
        assert_eq!(path, dir.path().join("staging.toml"));

        let config = ShiftConfig::from_file(&path).unwrap();
        assert_eq!(config.database.dbname, "b");
    }

    #[test]
    fn test_discover_yaml_fallback() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("test.yaml"), "database:\n  dbname: from_yaml\n").unwrap();

        let path = ShiftConfig::discover(dir.path(), "test").unwrap();
        let config = ShiftConfig::from_file(path).unwrap();
        assert_eq!(config.database.dbname, "from_yaml");
    }

    #[test]
    fn test_discover_missing() {
        let dir = TempDir::new().unwrap();
        let err = ShiftConfig::discover(dir.path(), "production").unwrap_err();
        assert!(matches!(err, ShiftError::Config(_)));
    }

    #[test]
    fn test_connect_options_pin_search_path_to_schema() {
        let toml = r#"
            [database]
            dbname = "app"

            [migrations]
            schema = "billing"
        "#;

        let config = ShiftConfig::parse_toml(toml).unwrap();
        let options = config.connect_options().unwrap();
        let startup = options.get_options().unwrap_or_default();
        assert!(startup.contains("search_path"));
        assert!(startup.contains("billing"));

        let default = ShiftConfig::parse_toml("[database]\ndbname = \"app\"").unwrap();
        let startup = default.connect_options().unwrap();
        assert!(startup.get_options().unwrap_or_default().contains("public"));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a")), ConfigFormat::Toml);
    }
}
