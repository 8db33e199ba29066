//! CLI argument parsing for runledger

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::report::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rl")]
#[command(author, version, about = "Ledger of adventure benchmark runs", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Aggregate every record into statistics and a leaderboard
    Report {
        /// Ledger directory (default: from config)
        dir: Option<PathBuf>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List individual runs
    List {
        /// Ledger directory (default: from config)
        dir: Option<PathBuf>,
    },
}
