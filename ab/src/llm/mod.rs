//! Model clients
//!
//! A provider transport is a single capability: send the conversation,
//! receive one completion with its token usage.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use client::mock::{MockLlmClient, ScriptStep};
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, TokenUsage,
    ToolCall, ToolDefinition,
};

use crate::config::{ProviderKind, ResolvedModel};

/// Create a client for a resolved model
pub fn create_client(model: &ResolvedModel) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(model = %model.id, kind = ?model.kind, "create_client: called");
    match model.kind {
        ProviderKind::Openai => Ok(Arc::new(OpenAIClient::new(
            &model.model,
            &model.api_key,
            &model.base_url,
        )?)),
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicClient::new(
            &model.model,
            &model.api_key,
            &model.base_url,
        )?)),
    }
}
