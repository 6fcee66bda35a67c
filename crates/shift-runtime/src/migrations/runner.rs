//! Migration runner.
//!
//! Applies pending `up` migrations from a directory in ascending version
//! order, one managed transaction per file, and appends one ledger row per
//! attempt. A failed migration is recorded and stops the run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shift_core::error::{Result, ShiftError};
use tracing::{debug, error, info, warn};

use super::bootstrap::SchemaBootstrapper;
use super::file::{Direction, MigrationFile};
use super::ledger::{Ledger, LedgerEntry};
use super::scanner::scan;
use super::sql::{ends_transaction, is_transaction_control, split_statements};
use crate::db::SqlExecutor;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Bootstrapping,
    LedgerReady,
    Scanning,
    Applying(i64),
    Done,
    Aborted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Bootstrapping => f.write_str("bootstrapping"),
            RunPhase::LedgerReady => f.write_str("ledger-ready"),
            RunPhase::Scanning => f.write_str("scanning"),
            RunPhase::Applying(version) => write!(f, "applying({})", version),
            RunPhase::Done => f.write_str("done"),
            RunPhase::Aborted => f.write_str("aborted"),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// High-water mark the run started from.
    pub starting_version: i64,
    /// Versions applied, in order.
    pub applied: Vec<i64>,
    /// Up versions at or below the high-water mark.
    pub skipped: Vec<i64>,
    /// Down scripts seen and left alone.
    pub down_scripts: Vec<i64>,
    /// Files whose names did not parse.
    pub invalid: Vec<PathBuf>,
}

/// Ledger state compared with the migrations directory.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub high_water_mark: i64,
    pub latest: Option<LedgerEntry>,
    pub entries: Vec<LedgerEntry>,
    pub pending: Vec<MigrationFile>,
    pub invalid: Vec<PathBuf>,
}

/// Files sorted into what the run will do with them.
#[derive(Debug, Default)]
struct Plan {
    pending: Vec<MigrationFile>,
    skipped: Vec<i64>,
    down_scripts: Vec<i64>,
    invalid: Vec<PathBuf>,
}

/// Runs migrations from a directory against a ledger.
pub struct MigrationRunner {
    ledger: Arc<dyn Ledger>,
    executor: Arc<dyn SqlExecutor>,
    migrations_dir: PathBuf,
    bootstrapper: Option<SchemaBootstrapper>,
    retry_failed: bool,
}

impl MigrationRunner {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        executor: Arc<dyn SqlExecutor>,
        migrations_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ledger,
            executor,
            migrations_dir: migrations_dir.into(),
            bootstrapper: None,
            retry_failed: true,
        }
    }

    /// Reset a schema before every run.
    pub fn with_bootstrapper(mut self, bootstrapper: SchemaBootstrapper) -> Self {
        self.bootstrapper = Some(bootstrapper);
        self
    }

    /// When true (the default), a version whose latest attempt failed is
    /// attempted again on the next run. When false, any recorded version,
    /// failed or not, raises the high-water mark.
    pub fn retry_failed(mut self, retry: bool) -> Self {
        self.retry_failed = retry;
        self
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Run all pending migrations.
    pub async fn run(&self) -> Result<RunReport> {
        let mut phase = RunPhase::Bootstrapping;
        let result = self.run_inner(&mut phase).await;

        match &result {
            Ok(report) => {
                debug!(phase = %RunPhase::Done, applied = report.applied.len(), "Run finished");
            }
            Err(e) => {
                debug!(phase = %RunPhase::Aborted, from = %phase, "Run aborted: {}", e);
            }
        }

        result
    }

    async fn run_inner(&self, phase: &mut RunPhase) -> Result<RunReport> {
        if let Some(bootstrapper) = &self.bootstrapper {
            debug!(phase = %*phase, schema = bootstrapper.schema(), "Resetting schema");
            bootstrapper.reset().await?;
        }

        self.ledger.ensure_table().await?;
        *phase = RunPhase::LedgerReady;
        debug!(phase = %*phase, "Ledger table ensured");

        let high_water_mark = self.high_water_mark().await?;

        *phase = RunPhase::Scanning;
        debug!(phase = %*phase, dir = %self.migrations_dir.display(), "Scanning migrations");
        let plan = self.plan(high_water_mark)?;

        let mut report = RunReport {
            starting_version: high_water_mark,
            applied: Vec::with_capacity(plan.pending.len()),
            skipped: plan.skipped,
            down_scripts: plan.down_scripts,
            invalid: plan.invalid,
        };

        if plan.pending.is_empty() {
            info!("No pending migrations above version {}", high_water_mark);
        }

        for file in &plan.pending {
            *phase = RunPhase::Applying(file.version);
            debug!(phase = %*phase, file = %file.file_name(), "Applying migration");
            self.apply(file).await?;
            report.applied.push(file.version);
        }

        *phase = RunPhase::Done;
        Ok(report)
    }

    /// Compare the ledger with the migrations directory without applying
    /// anything.
    pub async fn status(&self) -> Result<MigrationStatus> {
        self.ledger.ensure_table().await?;

        let entries = self.ledger.entries().await?;
        let latest = self.ledger.latest().await?;
        let high_water_mark = self.high_water_mark().await?;
        let plan = self.plan(high_water_mark)?;

        Ok(MigrationStatus {
            high_water_mark,
            latest,
            entries,
            pending: plan.pending,
            invalid: plan.invalid,
        })
    }

    /// Version above which `up` files are pending.
    async fn high_water_mark(&self) -> Result<i64> {
        let Some(latest) = self.ledger.latest().await? else {
            info!(
                "No migrations recorded. Running all migrations from {}",
                self.migrations_dir.display()
            );
            return Ok(0);
        };

        if latest.succeeded || !self.retry_failed {
            return Ok(latest.version);
        }

        let floor = self
            .ledger
            .latest_succeeded()
            .await?
            .map(|e| e.version)
            .unwrap_or(0);
        warn!(
            "Last attempt at migration version {} failed; retrying from version {}",
            latest.version, floor
        );
        Ok(floor)
    }

    /// Walk the directory and sort files into pending, skipped and invalid.
    /// Pending files come back in ascending version order regardless of
    /// the order the filesystem lists them.
    fn plan(&self, high_water_mark: i64) -> Result<Plan> {
        let mut plan = Plan::default();

        for file in scan(&self.migrations_dir)? {
            let file = file?;

            if !file.valid {
                warn!("Invalid migration file found at {}", file.path.display());
                plan.invalid.push(file.path);
                continue;
            }

            if !file.is_up() {
                debug!("Ignoring down migration {}", file.file_name());
                plan.down_scripts.push(file.version);
                continue;
            }

            if file.version <= high_water_mark {
                info!("Skipping migration version: {}", file.version);
                plan.skipped.push(file.version);
                continue;
            }

            plan.pending.push(file);
        }

        plan.pending
            .sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.path.cmp(&b.path)));
        plan.skipped.sort_unstable();
        plan.down_scripts.sort_unstable();
        plan.invalid.sort();

        if let Some(pair) = plan.pending.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(ShiftError::Validation(format!(
                "Duplicate migration version {}: {} and {}",
                pair[0].version,
                pair[0].file_name(),
                pair[1].file_name()
            )));
        }

        Ok(plan)
    }

    /// Apply one file and record the attempt.
    async fn apply(&self, file: &MigrationFile) -> Result<()> {
        let direction = file.direction.ok_or_else(|| {
            ShiftError::Validation(format!("{} has no direction", file.file_name()))
        })?;

        let sql = tokio::fs::read_to_string(&file.path).await?;

        let statements: Vec<String> = split_statements(&sql)
            .into_iter()
            .filter(|statement| {
                let control = is_transaction_control(statement);
                if control {
                    warn!(
                        "Migration version {}: ignoring '{}', each file already runs in a transaction",
                        file.version, statement
                    );
                }
                !control
            })
            .collect();

        if let Some((idx, statement)) = statements
            .iter()
            .enumerate()
            .find(|(_, statement)| ends_transaction(statement))
        {
            let reason = format!(
                "statement {} ('{}') would end the migration transaction",
                idx + 1,
                statement
            );
            return Err(self.fail(file, direction, reason).await);
        }

        if statements.is_empty() {
            warn!("Migration version {} contains no statements", file.version);
        }

        match self.executor.execute_in_transaction(&statements).await {
            Ok(()) => {
                info!("Migration version {} COMPLETED", file.version);
                self.ledger
                    .record(&LedgerEntry::attempt(file.version, direction, true))
                    .await
            }
            Err(e) => Err(self.fail(file, direction, e.to_string()).await),
        }
    }

    /// Record a failed attempt and build the error that stops the run.
    /// A ledger write failure here is logged, never returned.
    async fn fail(
        &self,
        file: &MigrationFile,
        direction: Direction,
        reason: String,
    ) -> ShiftError {
        error!("Migration version {} FAILED: {}", file.version, reason);

        let entry = LedgerEntry::attempt(file.version, direction, false);
        if let Err(record_err) = self.ledger.record(&entry).await {
            error!(
                "Could not record failed migration version {}: {}",
                file.version, record_err
            );
        }

        ShiftError::MigrationFailed {
            version: file.version,
            reason,
        }
    }
}
