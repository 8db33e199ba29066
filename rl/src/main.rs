use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use runledger::cli::{Cli, Command};
use runledger::config::Config;
use runledger::{Report, RunStore, runs_table};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("runledger starting");

    match cli.command {
        Command::Report { dir, format } => {
            let dir = dir.unwrap_or(config.log_dir);
            let store = RunStore::open(&dir).context(format!("Failed to open ledger: {}", dir.display()))?;
            let loaded = store.load()?;
            let report = Report::build(&loaded);
            print!("{}", report.render(format)?);
            if !loaded.warnings.is_empty() {
                eprintln!(
                    "{} {} record file(s) excluded",
                    "!".yellow(),
                    loaded.warnings.len()
                );
            }
        }
        Command::List { dir } => {
            let dir = dir.unwrap_or(config.log_dir);
            let store = RunStore::open(&dir).context(format!("Failed to open ledger: {}", dir.display()))?;
            let loaded = store.load()?;
            if loaded.records.is_empty() {
                println!("No runs found in {}", dir.display().to_string().cyan());
            } else {
                let mut records = loaded.records;
                records.sort_by(|a, b| a.started_at.cmp(&b.started_at));
                print!("{}", runs_table(&records));
            }
            for warning in &loaded.warnings {
                eprintln!("{} skipped {}: {}", "!".yellow(), warning.path.display(), warning.reason);
            }
        }
    }

    Ok(())
}
