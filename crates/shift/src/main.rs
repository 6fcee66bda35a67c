mod cli;

use std::process::ExitCode;

use clap::Parser;
use console::style;
use shift_core::ShiftError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("  {} {:#}", style("✗").red().bold(), e);

            let failed_version = e
                .downcast_ref::<ShiftError>()
                .and_then(ShiftError::migration_version);
            if let Some(version) = failed_version {
                eprintln!(
                    "  {} Fix migration version {} and run again; it is recorded as failed",
                    style("ℹ").blue(),
                    version
                );
            }

            ExitCode::FAILURE
        }
    }
}
