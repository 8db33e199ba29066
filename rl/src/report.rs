//! Report rendering: fixed-width text tables or JSON

use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::aggregate::{AggregateRow, Leaderboard, Summary, aggregate, leaderboard, summarize};
use crate::record::RunRecord;
use crate::store::{LoadWarning, Loaded};

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown format: '{}'. Use: text, json", other)),
        }
    }
}

/// Everything a report shows, computed from one scan of the ledger
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub rows: Vec<AggregateRow>,
    pub leaderboard: Leaderboard,
    pub summary: Summary,
    pub warnings: Vec<LoadWarning>,
}

impl Report {
    pub fn build(loaded: &Loaded) -> Self {
        let rows = aggregate(&loaded.records);
        let leaderboard = leaderboard(&rows);
        Self {
            summary: summarize(&loaded.records),
            rows,
            leaderboard,
            warnings: loaded.warnings.clone(),
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => serde_json::to_string_pretty(self),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "{:<28} {:<10} {:>5} {:>5} {:>4} {:>6} {:>9} {:>9} {:>9} {:>6}",
            "MODEL", "MODE", "RUNS", "WINS", "ERR", "WIN%", "AVG TOK", "MIN TOK", "MAX TOK", "TURNS"
        );
        let mut last_label: Option<&str> = None;
        for row in &self.rows {
            // print the label once per group
            let label = if last_label == Some(row.label.as_str()) {
                ""
            } else {
                row.label.as_str()
            };
            last_label = Some(row.label.as_str());
            let _ = writeln!(
                out,
                "{:<28} {:<10} {:>5} {:>5} {:>4} {:>6} {:>9} {:>9} {:>9} {:>6}",
                truncate(label, 28),
                row.mode.as_str(),
                row.runs,
                row.wins,
                row.errors,
                format!("{:.0}%", row.win_rate * 100.0),
                opt_f64(row.avg_tokens_to_win, 0),
                opt_u64(row.min_tokens_to_win),
                opt_u64(row.max_tokens_to_win),
                opt_f64(row.avg_turns, 1),
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "LEADERBOARD (tokens to win, lower is better)");
        let _ = writeln!(
            out,
            "{:>4}  {:<28} {:<10} {:>9} {:>5} {:>6}",
            "RANK", "MODEL", "MODE", "AVG TOK", "WINS", "WIN%"
        );
        if self.leaderboard.ranked.is_empty() {
            let _ = writeln!(out, "  (no winning runs)");
        }
        for entry in &self.leaderboard.ranked {
            let _ = writeln!(
                out,
                "{:>4}  {:<28} {:<10} {:>9.0} {:>5} {:>6}",
                entry.rank,
                truncate(&entry.label, 28),
                entry.mode.as_str(),
                entry.avg_tokens_to_win,
                entry.wins,
                format!("{:.0}%", entry.win_rate * 100.0),
            );
        }

        if !self.leaderboard.no_wins.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "No wins:");
            for row in &self.leaderboard.no_wins {
                let _ = writeln!(out, "  {} ({}) - {} runs, {} errors", row.label, row.mode, row.runs, row.errors);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Total: {} runs, {} wins, {} errors, {} tokens",
            self.summary.runs, self.summary.wins, self.summary.errors, self.summary.total_tokens
        );

        for warning in &self.warnings {
            let _ = writeln!(out, "warning: skipped {}: {}", warning.path.display(), warning.reason);
        }
        out
    }
}

/// Side-by-side table of individual runs
pub fn runs_table(records: &[RunRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<28} {:<10} {:<18} {:>8} {:>6} {:>8}",
        "MODEL", "MODE", "OUTCOME", "TOKENS", "TURNS", "INVALID"
    );
    for record in records {
        let _ = writeln!(
            out,
            "{:<28} {:<10} {:<18} {:>8} {:>6} {:>8}",
            truncate(&record.label, 28),
            record.mode.as_str(),
            record.outcome.label(),
            record.total_tokens,
            record.turns,
            record.invalid_turns,
        );
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(width.saturating_sub(1)).collect();
        t.push('~');
        t
    }
}

fn opt_f64(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn opt_u64(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
