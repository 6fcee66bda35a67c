use anyhow::Result;
use clap::Parser;
use console::style;

use super::CommandContext;

/// Show the ledger and pending migrations.
#[derive(Parser, Default)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        println!();
        println!(
            "  {}  {} Migration Status",
            style("⇪").bold(),
            style("SHIFT").bold().cyan()
        );
        println!();

        let connected = ctx.connect().await?;
        let result = connected.runner.status().await;
        connected.db.close().await;
        let status = result?;

        if status.entries.is_empty() && status.pending.is_empty() {
            println!("  {} No migrations found", style("ℹ").blue());
            println!();
            return Ok(());
        }

        if !status.entries.is_empty() {
            println!("  {} Ledger:", style("✓").green());
            for entry in &status.entries {
                let outcome = if entry.succeeded {
                    style("ok").green().to_string()
                } else {
                    style("failed").red().to_string()
                };
                println!(
                    "    {} {} {} ({})",
                    style(entry.version).cyan(),
                    entry.direction,
                    outcome,
                    format_timestamp(entry.created_at)
                );
            }
        }

        if !status.pending.is_empty() {
            if !status.entries.is_empty() {
                println!();
            }
            println!("  {} Pending:", style("○").yellow());
            for file in &status.pending {
                println!(
                    "    {} {}",
                    style("→").dim(),
                    style(file.file_name()).yellow()
                );
            }
        }

        for path in &status.invalid {
            println!(
                "  {} Invalid file {}",
                style("!").yellow(),
                path.display()
            );
        }

        println!();
        println!(
            "  {} high-water mark {}, {} pending",
            style("ℹ").blue(),
            status.high_water_mark,
            status.pending.len()
        );
        println!();

        Ok(())
    }
}

fn format_timestamp(nanos: i64) -> String {
    let secs = nanos.div_euclid(1_000_000_000);
    let sub = nanos.rem_euclid(1_000_000_000) as u32;
    chrono::DateTime::from_timestamp(secs, sub)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| nanos.to_string())
}
