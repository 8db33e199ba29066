//! RunLedger - append-only store of evaluation run records
//!
//! Every completed run of the adventure benchmark is sealed into a single
//! self-describing JSON file. The ledger never rewrites a file once it lands;
//! reports are recomputed from the full set of files each time.
//!
//! # Layout
//!
//! ```text
//! runs/
//! ├── .lock                                        # exclusive append lock
//! ├── 20261014T101500.123Z_gemini_shell_0192....json
//! └── 20261014T101812.004Z_gemini_structured_0192....json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use runledger::{RunStore, Report};
//!
//! let store = RunStore::open("runs")?;
//! let loaded = store.load()?;
//! let report = Report::build(&loaded);
//! println!("{}", report.render_text());
//! ```

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod record;
pub mod report;
mod store;

pub use aggregate::{AggregateRow, Leaderboard, LeaderboardEntry, Summary, aggregate, leaderboard, summarize};
pub use record::{Mode, OpenRun, Outcome, RunRecord, Turn, Verdict};
pub use report::{OutputFormat, Report, runs_table};
pub use store::{LedgerError, LoadWarning, Loaded, RunStore};

/// Name of the lock file guarding appends
pub const LOCK_FILE: &str = ".lock";
