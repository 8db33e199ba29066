//! adventbench - CLI entry point for benchmark runs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use adventbench::cli::{Cli, Command, ModeArg};
use adventbench::config::{Config, ModelsFile};
use adventbench::interface::{self, Projection};
use adventbench::llm::create_client;
use adventbench::{Driver, DriverConfig, Engine, Recorder};
use runledger::{OpenRun, Outcome, OutputFormat, Report, RunRecord, RunStore, runs_table};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("adventbench")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("adventbench.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            model,
            all,
            mode,
            token_limit,
            log_dir,
            models_file,
        } => cmd_run(config, model, all, mode, token_limit, log_dir, models_file).await,
        Command::Reset { dir } => cmd_reset(&dir),
        Command::Models { models_file } => cmd_models(models_file.as_ref()),
        Command::Report { log_dir, format } => cmd_report(&config, log_dir, format),
    }
}

fn outcome_colored(outcome: &Outcome) -> ColoredString {
    let label = outcome.label();
    if outcome.is_win() {
        label.green().bold()
    } else if outcome.is_run_failure() {
        label.red().bold()
    } else {
        label.yellow()
    }
}

fn print_finished(record: &RunRecord, path: &Path) {
    println!(
        "{} {} ({}) {} in {} turns, {} tokens -> {}",
        "■".cyan(),
        record.label.bold(),
        record.mode,
        outcome_colored(&record.outcome),
        record.turns,
        record.total_tokens,
        path.display().to_string().dimmed()
    );
    if let Outcome::ModelError { message } | Outcome::InternalError { message } = &record.outcome {
        println!("    {}", message.red());
    }
}

async fn cmd_run(
    mut config: Config,
    model: Option<String>,
    all: bool,
    mode: ModeArg,
    token_limit: Option<u64>,
    log_dir: Option<PathBuf>,
    models_file: Option<PathBuf>,
) -> Result<()> {
    debug!(?model, all, ?mode, ?token_limit, "cmd_run: called");
    if let Some(limit) = token_limit {
        config.eval.token_limit = limit;
    }

    let models = ModelsFile::load(models_file.as_ref())?;
    let entries = if all {
        models.models.clone()
    } else {
        model.iter().map(|m| models.entry_for(m)).collect()
    };

    // Nothing starts until every model resolves
    let resolved = config.validate_run(&entries)?;
    let clients = resolved
        .iter()
        .map(|m| create_client(m).context(format!("Failed to create client for {}", m.id)))
        .collect::<Result<Vec<_>>>()?;

    let log_dir = log_dir.unwrap_or_else(|| config.storage.expanded_log_dir());
    let recorder = Recorder::spawn(&log_dir).context(format!("Failed to open run store: {}", log_dir.display()))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling runs");
            eprintln!("{} cancelling runs...", "!".yellow());
            let _ = cancel_tx.send(true);
        }
    });

    let semaphore = Arc::new(Semaphore::new(config.eval.max_concurrent_runs.max(1)));
    let mut set = JoinSet::new();
    for ((entry, model), client) in entries.iter().zip(resolved).zip(clients) {
        for run_mode in mode.modes() {
            let driver_config = DriverConfig::from_eval(&config.eval, run_mode);
            let token_limit = driver_config.token_limit;
            let driver = Driver::new(client.clone(), driver_config).with_cancel(cancel_rx.clone());
            let semaphore = semaphore.clone();
            let recorder = recorder.clone();
            let label = entry.label();
            let model_id = model.id.clone();

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                println!("{} {} ({})", "▶".cyan(), label.bold(), run_mode);
                let record = match interface::create(run_mode) {
                    Ok(interface) => driver.run(interface, &model_id, &label).await,
                    Err(e) => OpenRun::begin(&model_id, &label, run_mode, token_limit)
                        .seal(Outcome::InternalError { message: e.to_string() }),
                };
                let path = recorder.append(record.clone()).await?;
                Ok::<_, eyre::Report>((record, path))
            });
        }
    }

    let mut records = Vec::new();
    let mut failures = 0;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok((record, path))) => {
                print_finished(&record, &path);
                records.push(record);
            }
            Ok(Err(e)) => {
                failures += 1;
                eprintln!("{} {:#}", "error:".red(), e);
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} run task failed: {}", "error:".red(), e);
            }
        }
    }
    recorder.shutdown().await?;

    if !records.is_empty() {
        records.sort_by(|a, b| (&a.label, a.mode).cmp(&(&b.label, b.mode)));
        println!();
        print!("{}", runs_table(&records));
    }
    if failures > 0 {
        bail!("{} run(s) could not be recorded", failures);
    }
    Ok(())
}

fn cmd_reset(dir: &Path) -> Result<()> {
    debug!(dir = %dir.display(), "cmd_reset: called");
    let mut projection = Projection::at(dir);
    projection
        .reset(&Engine::station())
        .context(format!("Failed to reset projection at {}", dir.display()))?;
    println!(
        "{} Station reset at {}",
        "✓".green(),
        projection.station_dir().display().to_string().cyan()
    );
    Ok(())
}

fn cmd_models(models_file: Option<&PathBuf>) -> Result<()> {
    debug!(?models_file, "cmd_models: called");
    let models = ModelsFile::load(models_file)?;
    if models.models.is_empty() {
        println!("No models configured. Add them to models.yaml:");
        println!("  models:\n    - name: openrouter/google/gemini-2.5-flash\n      label: gemini-flash");
        return Ok(());
    }
    let width = models.models.iter().map(|m| m.label().len()).max().unwrap_or(0);
    for entry in &models.models {
        println!("{:<width$}  {}", entry.label().bold(), entry.name, width = width);
    }
    Ok(())
}

fn cmd_report(config: &Config, log_dir: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let dir = log_dir.unwrap_or_else(|| config.storage.expanded_log_dir());
    debug!(dir = %dir.display(), ?format, "cmd_report: called");
    let store = RunStore::open(&dir).context(format!("Failed to open run store: {}", dir.display()))?;
    let loaded = store.load()?;
    let report = Report::build(&loaded);
    print!("{}", report.render(format)?);
    if !loaded.warnings.is_empty() {
        eprintln!("{} {} record file(s) excluded", "!".yellow(), loaded.warnings.len());
    }
    Ok(())
}
