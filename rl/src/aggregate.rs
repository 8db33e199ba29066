//! Reduce run records into per-(model, mode) statistics and a leaderboard
//!
//! Everything here is a pure function of the record set. Sums are kept as
//! exact integers until the final division so the result does not depend on
//! the order records were loaded in.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::record::{Mode, RunRecord};

/// Statistics for one (model, mode) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub model: String,
    pub label: String,
    pub mode: Mode,
    /// Runs with a gameplay outcome
    pub runs: u32,
    pub wins: u32,
    /// Runs that ended in a model, internal or cancellation failure
    pub errors: u32,
    pub win_rate: f64,
    pub avg_tokens_to_win: Option<f64>,
    pub min_tokens_to_win: Option<u64>,
    pub max_tokens_to_win: Option<u64>,
    pub avg_turns: Option<f64>,
}

impl AggregateRow {
    pub fn has_wins(&self) -> bool {
        self.wins > 0
    }
}

/// One ranked leaderboard line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub model: String,
    pub label: String,
    pub mode: Mode,
    pub avg_tokens_to_win: f64,
    pub win_rate: f64,
    pub wins: u32,
    pub runs: u32,
}

/// Ranked pairs plus the pairs that never won
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub ranked: Vec<LeaderboardEntry>,
    pub no_wins: Vec<AggregateRow>,
}

/// Corpus-wide totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub runs: u32,
    pub wins: u32,
    pub errors: u32,
    pub total_tokens: u64,
}

#[derive(Default)]
struct Accumulator {
    label: Option<String>,
    runs: u32,
    wins: u32,
    errors: u32,
    turns: u64,
    win_tokens: u64,
    min_win: Option<u64>,
    max_win: Option<u64>,
}

impl Accumulator {
    fn add(&mut self, record: &RunRecord) {
        // smallest label keeps the choice independent of load order
        match &self.label {
            Some(label) if label <= &record.label => {}
            _ => self.label = Some(record.label.clone()),
        }

        if record.outcome.is_run_failure() {
            self.errors += 1;
            return;
        }

        self.runs += 1;
        self.turns += u64::from(record.turns);
        if record.is_win() {
            self.wins += 1;
            self.win_tokens += record.total_tokens;
            self.min_win = Some(self.min_win.map_or(record.total_tokens, |m| m.min(record.total_tokens)));
            self.max_win = Some(self.max_win.map_or(record.total_tokens, |m| m.max(record.total_tokens)));
        }
    }

    fn finish(self, model: String, mode: Mode) -> AggregateRow {
        let win_rate = if self.runs == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.runs)
        };
        let avg_tokens_to_win = (self.wins > 0).then(|| self.win_tokens as f64 / f64::from(self.wins));
        let avg_turns = (self.runs > 0).then(|| self.turns as f64 / f64::from(self.runs));

        AggregateRow {
            label: self.label.unwrap_or_else(|| model.clone()),
            model,
            mode,
            runs: self.runs,
            wins: self.wins,
            errors: self.errors,
            win_rate,
            avg_tokens_to_win,
            min_tokens_to_win: self.min_win,
            max_tokens_to_win: self.max_win,
            avg_turns,
        }
    }
}

/// Group records by (model, mode) and compute their statistics
///
/// Rows come back sorted by label, then model, then mode.
pub fn aggregate(records: &[RunRecord]) -> Vec<AggregateRow> {
    debug!(records = records.len(), "aggregate: called");
    let mut groups: BTreeMap<(String, Mode), Accumulator> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.model.clone(), record.mode))
            .or_default()
            .add(record);
    }

    let mut rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|((model, mode), acc)| acc.finish(model, mode))
        .collect();
    rows.sort_by(|a, b| {
        a.label
            .cmp(&b.label)
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| a.mode.cmp(&b.mode))
    });
    rows
}

/// Rank rows with at least one win; list the rest separately
pub fn leaderboard(rows: &[AggregateRow]) -> Leaderboard {
    let (winners, no_wins): (Vec<&AggregateRow>, Vec<&AggregateRow>) = rows.iter().partition(|r| r.has_wins());

    let mut winners: Vec<(&AggregateRow, f64)> = winners
        .into_iter()
        .filter_map(|row| row.avg_tokens_to_win.map(|avg| (row, avg)))
        .collect();
    winners.sort_by(|(a, a_avg), (b, b_avg)| {
        a_avg
            .total_cmp(b_avg)
            .then_with(|| b.win_rate.total_cmp(&a.win_rate))
            .then_with(|| b.runs.cmp(&a.runs))
            .then_with(|| tie_break(a, b))
    });

    let ranked = winners
        .into_iter()
        .enumerate()
        .map(|(i, (row, avg))| LeaderboardEntry {
            rank: i + 1,
            model: row.model.clone(),
            label: row.label.clone(),
            mode: row.mode,
            avg_tokens_to_win: avg,
            win_rate: row.win_rate,
            wins: row.wins,
            runs: row.runs,
        })
        .collect();

    Leaderboard {
        ranked,
        no_wins: no_wins.into_iter().cloned().collect(),
    }
}

fn tie_break(a: &AggregateRow, b: &AggregateRow) -> Ordering {
    a.label
        .cmp(&b.label)
        .then_with(|| a.mode.cmp(&b.mode))
        .then_with(|| a.model.cmp(&b.model))
}

/// Totals over every record, failures included
pub fn summarize(records: &[RunRecord]) -> Summary {
    records.iter().fold(Summary::default(), |mut acc, record| {
        if record.outcome.is_run_failure() {
            acc.errors += 1;
        } else {
            acc.runs += 1;
        }
        if record.is_win() {
            acc.wins += 1;
        }
        acc.total_tokens += record.total_tokens;
        acc
    })
}
