use anyhow::Result;
use clap::Parser;
use console::style;

use shift_runtime::migrations::SchemaBootstrapper;

use super::CommandContext;

/// Reset the schema and apply pending migrations.
#[derive(Parser, Default)]
pub struct UpCommand {
    /// Do not drop and recreate the schema first.
    #[arg(long)]
    pub keep_schema: bool,
}

impl UpCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        println!();
        println!(
            "  {}  {} Migrations",
            style("⇪").bold(),
            style("SHIFT").bold().cyan()
        );
        println!();

        let connected = ctx.connect().await?;

        let reset = ctx.config.migrations.reset_schema && !self.keep_schema;
        let runner = if reset {
            let bootstrapper =
                SchemaBootstrapper::new(connected.executor.clone(), &ctx.config.migrations.schema)?;
            println!(
                "  {} Resetting schema {}",
                style("→").dim(),
                style(bootstrapper.schema()).yellow()
            );
            connected.runner.with_bootstrapper(bootstrapper)
        } else {
            connected.runner
        };

        println!(
            "  {} Running pending migrations from {}...",
            style("→").dim(),
            runner.migrations_dir().display()
        );

        let result = runner.run().await;
        connected.db.close().await;
        let report = result?;

        for path in &report.invalid {
            println!(
                "  {} Skipped invalid file {}",
                style("!").yellow(),
                path.display()
            );
        }

        if report.applied.is_empty() {
            println!(
                "  {} Nothing to apply, already at version {}",
                style("ℹ").blue(),
                report.starting_version
            );
        } else {
            for version in &report.applied {
                println!("  {} Applied version {}", style("✓").green(), version);
            }
            println!();
            println!(
                "  {} Applied {} migration(s)",
                style("✓").green(),
                report.applied.len()
            );
        }
        println!();

        Ok(())
    }
}
