//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use runledger::{Mode, OutputFormat};
use std::path::PathBuf;

/// adventbench - text adventure benchmark for LLM tool interfaces
#[derive(Parser, Debug)]
#[command(
    name = "ab",
    author,
    version,
    about = "Compare how models play a text adventure through a shell or structured tools"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Which interfaces a run command covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Shell,
    Structured,
    All,
}

impl ModeArg {
    pub fn modes(&self) -> Vec<Mode> {
        match self {
            ModeArg::Shell => vec![Mode::Shell],
            ModeArg::Structured => vec![Mode::Structured],
            ModeArg::All => Mode::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play runs and record them
    Run {
        /// Model identifier, e.g. openrouter/google/gemini-2.5-flash
        #[arg(short, long, conflicts_with = "all", required_unless_present = "all")]
        model: Option<String>,

        /// Every model in the models file
        #[arg(long)]
        all: bool,

        /// Interface to use
        #[arg(long, value_enum, default_value = "all")]
        mode: ModeArg,

        /// Cumulative token budget per run (default: from config)
        #[arg(short, long)]
        token_limit: Option<u64>,

        /// Directory for run records (default: from config)
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Models file listing models and labels
        #[arg(long)]
        models_file: Option<PathBuf>,
    },

    /// Materialize a pristine shell projection at a path
    Reset {
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// List configured models
    Models {
        #[arg(long)]
        models_file: Option<PathBuf>,
    },

    /// Aggregate recorded runs into statistics and a leaderboard
    Report {
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}
