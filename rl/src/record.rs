//! RunRecord domain type
//!
//! A run starts as an [`OpenRun`] accumulator owned by the conversation
//! driver and is sealed exactly once into an immutable [`RunRecord`].

use chrono::{DateTime, Utc};
use tracing::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Interface style the model used during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Unstructured shell commands over a directory tree
    Shell,
    /// Structured function calls against a fixed tool schema
    Structured,
}

impl Mode {
    /// Every mode, in report order
    pub const ALL: [Mode; 2] = [Mode::Shell, Mode::Structured];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Shell => "shell",
            Mode::Structured => "structured",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shell" | "bash" => Ok(Mode::Shell),
            "structured" | "mcp" | "tools" => Ok(Mode::Structured),
            other => Err(format!("Unknown mode: '{}'. Use: shell, structured", other)),
        }
    }
}

/// Terminal state of a run
///
/// The first four variants are gameplay outcomes. The rest are run-level
/// failures of the harness or the provider and are reported separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Won,
    TokenLimit,
    GaveUp,
    TooManyInvalid,
    ModelError { message: String },
    InternalError { message: String },
    Cancelled,
}

impl Outcome {
    pub fn is_win(&self) -> bool {
        matches!(self, Outcome::Won)
    }

    /// True for outcomes that say nothing about the model's play
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            Outcome::ModelError { .. } | Outcome::InternalError { .. } | Outcome::Cancelled
        )
    }

    /// Short label for tables and logs
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Won => "WON",
            Outcome::TokenLimit => "TOKEN_LIMIT",
            Outcome::GaveUp => "GAVE_UP",
            Outcome::TooManyInvalid => "TOO_MANY_INVALID",
            Outcome::ModelError { .. } => "MODEL_ERROR",
            Outcome::InternalError { .. } => "INTERNAL_ERROR",
            Outcome::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::ModelError { message } | Outcome::InternalError { message } => {
                write!(f, "{} ({})", self.label(), message)
            }
            _ => f.write_str(self.label()),
        }
    }
}

/// How the driver classified the action of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    Invalid,
    GiveUp,
}

/// One model-call/action/observation cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based position in the transcript
    pub index: u32,
    /// Newest user-side message the model answered on this turn
    pub prompt: String,
    /// The action as the model expressed it
    pub action: String,
    /// What the world answered; empty for a give-up turn
    pub observation: String,
    pub verdict: Verdict,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Sealed, immutable record of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    /// Canonical model identifier used for the provider call
    pub model: String,
    /// Display label, reporting only
    pub label: String,
    pub mode: Mode,
    pub outcome: Outcome,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// Valid actions applied to the world
    pub turns: u32,
    /// Turns classified invalid
    pub invalid_turns: u32,
    pub token_limit: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transcript: Vec<Turn>,
}

impl RunRecord {
    pub fn is_win(&self) -> bool {
        self.outcome.is_win()
    }

    /// File name under which the ledger stores this record
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.json",
            self.started_at.format("%Y%m%dT%H%M%S%.3fZ"),
            sanitize(&self.label),
            self.mode,
            self.id
        )
    }
}

/// Mutable accumulator for a run in progress
#[derive(Debug)]
pub struct OpenRun {
    id: String,
    model: String,
    label: String,
    mode: Mode,
    token_limit: u64,
    started_at: DateTime<Utc>,
    transcript: Vec<Turn>,
    input_tokens: u64,
    output_tokens: u64,
    turns: u32,
    invalid_turns: u32,
}

impl OpenRun {
    pub fn begin(model: impl Into<String>, label: impl Into<String>, mode: Mode, token_limit: u64) -> Self {
        let model = model.into();
        let label = label.into();
        debug!("OpenRun::begin: model={} label={} mode={}", model, label, mode);
        Self {
            id: Uuid::now_v7().to_string(),
            model,
            label,
            mode,
            token_limit,
            started_at: Utc::now(),
            transcript: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
            turns: 0,
            invalid_turns: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Append a turn; token totals are the sum of per-turn usage
    pub fn push_turn(&mut self, prompt: String, action: String, observation: String, verdict: Verdict, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
        match verdict {
            Verdict::Valid => self.turns += 1,
            Verdict::Invalid => self.invalid_turns += 1,
            Verdict::GiveUp => {}
        }
        let index = self.transcript.len() as u32 + 1;
        debug!("OpenRun::push_turn: run={} index={} verdict={:?}", self.id, index, verdict);
        self.transcript.push(Turn {
            index,
            prompt,
            action,
            observation,
            verdict,
            input_tokens,
            output_tokens,
        });
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn invalid_turns(&self) -> u32 {
        self.invalid_turns
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Consume the accumulator; the result cannot be changed afterwards
    pub fn seal(self, outcome: Outcome) -> RunRecord {
        debug!("OpenRun::seal: run={} outcome={}", self.id, outcome);
        RunRecord {
            total_tokens: self.input_tokens + self.output_tokens,
            id: self.id,
            model: self.model,
            label: self.label,
            mode: self.mode,
            outcome,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            turns: self.turns,
            invalid_turns: self.invalid_turns,
            token_limit: self.token_limit,
            started_at: self.started_at,
            finished_at: Utc::now(),
            transcript: self.transcript,
        }
    }
}

/// Keep a label usable inside a file name
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("shell".parse::<Mode>().unwrap(), Mode::Shell);
        assert_eq!("bash".parse::<Mode>().unwrap(), Mode::Shell);
        assert_eq!("Structured".parse::<Mode>().unwrap(), Mode::Structured);
        assert_eq!("mcp".parse::<Mode>().unwrap(), Mode::Structured);
        assert!("gui".parse::<Mode>().is_err());
    }

    #[test]
    fn test_seal_sums_turn_usage() {
        let mut run = OpenRun::begin("openrouter/x/model-a", "model-a", Mode::Shell, 50_000);
        run.push_turn("p1".into(), "ls".into(), "README".into(), Verdict::Valid, 100, 5);
        run.push_turn("p2".into(), "rm -rf /".into(), "invalid".into(), Verdict::Invalid, 120, 7);
        run.push_turn("p3".into(), "GIVE_UP".into(), String::new(), Verdict::GiveUp, 130, 2);

        let record = run.seal(Outcome::GaveUp);

        assert_eq!(record.input_tokens, 350);
        assert_eq!(record.output_tokens, 14);
        assert_eq!(record.total_tokens, 364);
        assert_eq!(record.turns, 1);
        assert_eq!(record.invalid_turns, 1);
        assert_eq!(record.transcript.len(), 3);
        assert_eq!(record.transcript[2].index, 3);
        assert!(record.finished_at >= record.started_at);
    }

    #[test]
    fn test_outcome_classification() {
        assert!(Outcome::Won.is_win());
        assert!(!Outcome::TokenLimit.is_win());
        assert!(!Outcome::TooManyInvalid.is_run_failure());
        assert!(Outcome::Cancelled.is_run_failure());
        assert!(
            Outcome::ModelError {
                message: "boom".into()
            }
            .is_run_failure()
        );
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::ModelError {
            message: "timeout".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "model_error");
        assert_eq!(json["message"], "timeout");

        let json = serde_json::to_value(Outcome::TooManyInvalid).unwrap();
        assert_eq!(json["kind"], "too_many_invalid");
    }

    #[test]
    fn test_file_name_is_safe() {
        let run = OpenRun::begin("openrouter/google/gemini 2.5", "Gemini 2.5/flash", Mode::Structured, 10);
        let record = run.seal(Outcome::Won);
        let name = record.file_name();

        assert!(name.ends_with(".json"));
        assert!(name.contains("_Gemini_2.5_flash_structured_"));
        assert!(!name.contains('/'));
        assert!(!name.contains(':'));
    }
}
