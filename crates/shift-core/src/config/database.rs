use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::{Result, ShiftError};

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Server host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Role to connect as.
    #[serde(default = "default_user")]
    pub user: String,

    /// Password for `user`.
    #[serde(default)]
    pub password: String,

    /// Database name.
    #[serde(default)]
    pub dbname: String,

    /// libpq-style SSL mode.
    #[serde(default = "default_sslmode")]
    pub sslmode: String,

    /// Full connection URL. Takes precedence over the discrete fields.
    #[serde(default)]
    pub url: Option<String>,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Pool checkout timeout in seconds.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            dbname: String::new(),
            sslmode: default_sslmode(),
            url: None,
            pool_size: default_pool_size(),
            pool_timeout_secs: default_pool_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Parsed SSL mode.
    pub fn ssl_mode(&self) -> Result<PgSslMode> {
        PgSslMode::from_str(&self.sslmode)
            .map_err(|_| ShiftError::Config(format!("Unknown sslmode '{}'", self.sslmode)))
    }

    /// Build driver connection options.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| ShiftError::Config(format!("Invalid database url: {}", e)));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.dbname)
            .ssl_mode(self.ssl_mode()?);

        if !self.password.is_empty() {
            options = options.password(&self.password);
        }

        Ok(options)
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_some() {
            return Ok(());
        }
        if self.dbname.trim().is_empty() {
            return Err(ShiftError::Config(
                "database.dbname is required when database.url is not set".into(),
            ));
        }
        if self.pool_size == 0 {
            return Err(ShiftError::Config("database.pool_size must be at least 1".into()));
        }
        self.ssl_mode()?;
        Ok(())
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_sslmode() -> String {
    "prefer".to_string()
}

fn default_pool_size() -> u32 {
    2
}

fn default_pool_timeout() -> u64 {
    30
}
