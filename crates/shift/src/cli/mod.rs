mod status;
mod up;

pub use status::StatusCommand;
pub use up::UpCommand;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use shift_core::config::{LoggingConfig, ShiftConfig};
use shift_runtime::migrations::{MigrationRunner, PgLedger};
use shift_runtime::{Database, PgExecutor, SqlExecutor};

/// SHIFT - reset a PostgreSQL schema and apply versioned SQL migrations
#[derive(Parser)]
#[command(name = "shift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path. Defaults to `<config-dir>/<ENV>.{toml,yml,yaml}`.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory searched for per-environment configuration files.
    #[arg(long, default_value = "config", global = true)]
    pub config_dir: PathBuf,

    /// Migrations directory path (overrides config).
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Reset the schema and apply pending migrations (default).
    Up(UpCommand),

    /// Show the ledger and pending migrations.
    Status(StatusCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();

        let config = self.load_config()?;
        init_logging(&config.logging);

        let ctx = CommandContext::new(config, self.migrations_dir);
        match self.command {
            Some(Commands::Up(cmd)) => cmd.execute(&ctx).await,
            Some(Commands::Status(cmd)) => cmd.execute(&ctx).await,
            None => UpCommand::default().execute(&ctx).await,
        }
    }

    fn load_config(&self) -> Result<ShiftConfig> {
        let config = match &self.config {
            Some(path) => ShiftConfig::from_file(path)
                .with_context(|| format!("Loading {}", path.display()))?,
            None => ShiftConfig::from_env_dir(&self.config_dir)?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Initialise tracing. RUST_LOG wins over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // A subscriber may already be installed (tests); keep it.
    let _ = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Resolved configuration shared by commands.
pub struct CommandContext {
    pub config: ShiftConfig,
    pub migrations_dir: PathBuf,
}

impl CommandContext {
    pub fn new(config: ShiftConfig, migrations_dir: Option<PathBuf>) -> Self {
        let migrations_dir = migrations_dir.unwrap_or_else(|| config.migrations.dir.clone());
        Self {
            config,
            migrations_dir,
        }
    }

    /// Connect and build a runner over the configured ledger table.
    pub async fn connect(&self) -> Result<Connected> {
        let db = Database::from_config(&self.config).await?;
        db.health_check().await?;
        info!(
            "Connected to {}:{}/{}",
            self.config.database.host, self.config.database.port, self.config.database.dbname
        );

        let executor: Arc<dyn SqlExecutor> = Arc::new(PgExecutor::new(db.pool().clone()));
        let ledger = PgLedger::new(db.pool().clone(), &self.config.migrations.table)?;
        let runner = MigrationRunner::new(Arc::new(ledger), executor.clone(), &self.migrations_dir)
            .retry_failed(self.config.migrations.retry_failed);

        Ok(Connected {
            db,
            executor,
            runner,
        })
    }
}

/// Live database handles for one command.
pub struct Connected {
    pub db: Database,
    pub executor: Arc<dyn SqlExecutor>,
    pub runner: MigrationRunner,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_default_command() {
        let cli = Cli::try_parse_from(["shift"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config_dir, PathBuf::from("config"));
    }

    #[test]
    fn test_cli_parse_up() {
        let cli = Cli::try_parse_from(["shift", "up", "--keep-schema"]).unwrap();
        match cli.command {
            Some(Commands::Up(cmd)) => assert!(cmd.keep_schema),
            _ => panic!("expected up"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shift",
            "status",
            "--config",
            "config/test.yml",
            "--migrations-dir",
            "db/migrations",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Status(_))));
        assert_eq!(cli.config, Some(PathBuf::from("config/test.yml")));
        assert_eq!(cli.migrations_dir, Some(PathBuf::from("db/migrations")));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["shift", "down"]).is_err());
    }

    #[test]
    fn test_context_prefers_flag_over_config() {
        let config = ShiftConfig::parse_toml("[database]\ndbname = \"app\"\n").unwrap();

        let ctx = CommandContext::new(config.clone(), None);
        assert_eq!(ctx.migrations_dir, PathBuf::from("migrations"));

        let ctx = CommandContext::new(config, Some(PathBuf::from("other")));
        assert_eq!(ctx.migrations_dir, PathBuf::from("other"));
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ci.yml");
        std::fs::write(&path, "database:\n  dbname: ci\nmigrations:\n  schema: app\n").unwrap();

        let cli = Cli::try_parse_from(["shift", "--config", path.to_str().unwrap()]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.database.dbname, "ci");
        assert_eq!(config.migrations.schema, "app");
    }

    #[test]
    fn test_load_config_validates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[database]\nhost = \"localhost\"\n").unwrap();

        let cli = Cli::try_parse_from(["shift", "--config", path.to_str().unwrap()]).unwrap();
        assert!(cli.load_config().is_err());
    }
}
