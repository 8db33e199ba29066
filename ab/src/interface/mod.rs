//! Interface adapters: two command surfaces over one engine
//!
//! The driver only sees [`Interface`]. Each adapter owns its [`Engine`] for
//! the lifetime of a run and translates model output into engine calls.

use async_trait::async_trait;
use runledger::{Mode, Verdict};
use std::path::PathBuf;
use thiserror::Error;

use crate::llm::{CompletionResponse, ContentBlock, ToolCall, ToolDefinition};
use crate::world::{Engine, EngineError};

pub mod projection;
mod shell;
mod structured;

pub use projection::Projection;
pub use shell::ShellInterface;
pub use structured::StructuredInterface;

/// Exact model text that ends a run by choice
pub const GIVE_UP: &str = "GIVE_UP";

/// Failures that invalidate a run; invalid actions are not errors
#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("projection diverged from engine: {0}")]
    Inconsistent(String),

    #[error("projection I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine: {0}")]
    Engine(#[from] EngineError),
}

/// One model turn, reduced to what an adapter can act on
#[derive(Debug, Clone, PartialEq)]
pub enum RawAction {
    /// A shell command line
    Command(String),
    /// Tool calls from a structured response
    Calls(Vec<ToolCall>),
    /// Free text with no tool call
    Text(String),
    Empty,
}

impl RawAction {
    /// Single-line form stored in the transcript
    pub fn describe(&self) -> String {
        match self {
            Self::Command(cmd) => cmd.clone(),
            Self::Calls(calls) => calls
                .iter()
                .map(|c| format!("{}({})", c.name, c.input))
                .collect::<Vec<_>>()
                .join("; "),
            Self::Text(text) => text.clone(),
            Self::Empty => String::new(),
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Self::Command(t) | Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Result of applying one action
#[derive(Debug, Clone)]
pub struct Applied {
    pub observation: String,
    pub verdict: Verdict,
    /// Tool results to return to the model; empty for plain-text replies
    pub tool_results: Vec<ContentBlock>,
}

impl Applied {
    pub fn valid(observation: impl Into<String>) -> Self {
        Self {
            observation: observation.into(),
            verdict: Verdict::Valid,
            tool_results: Vec::new(),
        }
    }

    pub fn invalid(observation: impl Into<String>) -> Self {
        Self {
            observation: observation.into(),
            verdict: Verdict::Invalid,
            tool_results: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }
}

#[async_trait]
pub trait Interface: Send {
    fn mode(&self) -> Mode;

    /// Fixed instructions for this surface
    fn system_prompt(&self) -> &'static str;

    /// Tool schema offered to the model
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Observation of the current room
    fn render_observation(&self) -> Result<String, InterfaceError> {
        Ok(self.engine().look()?)
    }

    /// Reduce a model response to an action
    fn extract(&self, response: &CompletionResponse) -> RawAction;

    /// Explicit give-up signal
    fn is_terminal_action(&self, action: &RawAction) -> bool {
        action.text().is_some_and(|t| t.trim() == GIVE_UP)
    }

    /// Apply one action; `Err` only when the run can no longer be trusted
    async fn apply(&mut self, action: &RawAction) -> Result<Applied, InterfaceError>;

    fn engine(&self) -> &Engine;

    /// Drop per-run resources; safe to call more than once
    fn release(&mut self) -> Result<(), InterfaceError>;
}

/// Build a fresh adapter over a fresh station
pub fn create(mode: Mode) -> Result<Box<dyn Interface>, InterfaceError> {
    tracing::debug!(%mode, "create: called");
    Ok(match mode {
        Mode::Shell => Box::new(ShellInterface::new(Engine::station())?),
        Mode::Structured => Box::new(StructuredInterface::new(Engine::station())),
    })
}
