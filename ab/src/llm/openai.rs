//! OpenAI-compatible chat completions client
//!
//! Serves both OpenAI and OpenRouter, which share the wire format.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, MessageContent, Role,
    StopReason, TokenUsage, ToolCall,
};

/// Seconds to wait when a 429 carries no usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenAIClient {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, LlmError> {
        let model = model.into();
        debug!(%model, "OpenAIClient::new: called");
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(LlmError::Network)?;
        Ok(Self {
            model,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(self.convert_messages(&request.messages));

        // reasoning-series models reject max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(request.max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(request.max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools.iter().map(|t| t.to_openai_schema()).collect::<Vec<_>>());
            body["tool_choice"] = serde_json::json!("auto");
        }

        body
    }

    /// Convert internal messages to chat-completions messages
    ///
    /// Each tool result becomes its own `tool` role message.
    fn convert_messages(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        debug!(message_count = %messages.len(), "convert_messages: called");
        let mut result = Vec::new();

        for msg in messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };

            let blocks = match &msg.content {
                MessageContent::Text(text) => {
                    result.push(serde_json::json!({ "role": role, "content": text }));
                    continue;
                }
                MessageContent::Blocks(blocks) => blocks,
            };

            let mut tool_calls = Vec::new();
            let mut tool_results = Vec::new();
            let mut text_content = String::new();

            for block in blocks {
                match block {
                    ContentBlock::Text { text } => text_content.push_str(text),
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(serde_json::json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string(),
                        }
                    })),
                    ContentBlock::ToolResult {
                        tool_use_id, content, ..
                    } => tool_results.push((tool_use_id, content)),
                }
            }

            if !tool_results.is_empty() {
                for (tool_call_id, content) in tool_results {
                    result.push(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_call_id,
                        "content": content,
                    }));
                }
                if !text_content.is_empty() {
                    result.push(serde_json::json!({ "role": "user", "content": text_content }));
                }
                continue;
            }

            if !tool_calls.is_empty() {
                let mut msg = serde_json::json!({
                    "role": "assistant",
                    "tool_calls": tool_calls,
                });
                if !text_content.is_empty() {
                    msg["content"] = serde_json::json!(text_content);
                }
                result.push(msg);
                continue;
            }

            result.push(serde_json::json!({ "role": role, "content": text_content }));
        }

        result
    }

    /// Parse the chat completions response
    fn parse_response(&self, api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                // unparseable arguments stay a raw string so validation rejects them
                input: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::String(tc.function.arguments)),
            })
            .collect();

        let usage = api_response.usage.unwrap_or_default();
        Ok(CompletionResponse {
            content: choice.message.content,
            tool_calls,
            stop_reason: StopReason::from_openai(choice.finish_reason.as_deref()),
            usage: TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            debug!(retry_after, "complete: rate limited (429)");
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(%status, "complete: API error");
            return Err(LlmError::ApiError { status, message });
        }

        let api_response: OpenAIResponse = response.json().await?;
        self.parse_response(api_response)
    }
}

// Chat completions response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolDefinition;

    fn client(model: &str) -> OpenAIClient {
        OpenAIClient::new(model, "test-key", "https://openrouter.ai/api/").unwrap()
    }

    #[test]
    fn test_build_request_body_basic() {
        let request = CompletionRequest {
            system_prompt: "You are playing a game".to_string(),
            messages: vec![Message::user("Game started.")],
            tools: vec![],
            max_tokens: 64,
        };

        let body = client("google/gemini-2.5-flash").build_request_body(&request);

        assert_eq!(body["model"], "google/gemini-2.5-flash");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Game started.");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_reasoning_models_use_completion_tokens() {
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![],
            tools: vec![],
            max_tokens: 256,
        };
        let body = client("o3-mini").build_request_body(&request);
        assert_eq!(body["max_completion_tokens"], 256);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_tools_and_tool_results_convert() {
        let call = ToolCall::new("call_1", "go", serde_json::json!({"direction": "north"}));
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![
                Message::user("start"),
                Message::from_response(&CompletionResponse::tool(call, TokenUsage::default())),
                Message::user_blocks(vec![ContentBlock::tool_result("call_1", "You are in the corridor.", false)]),
            ],
            tools: vec![ToolDefinition::new("go", "Move", serde_json::json!({"type": "object"}))],
            max_tokens: 256,
        };

        let body = client("openai/gpt-4o").build_request_body(&request);

        assert_eq!(body["tools"][0]["function"]["name"], "go");
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "go");
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_parse_response_keeps_bad_arguments_raw() {
        let api: OpenAIResponse = serde_json::from_value(serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{ "id": "c1", "function": { "name": "take", "arguments": "{item: flash" } }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 300, "completion_tokens": 12 }
        }))
        .unwrap();

        let response = client("x").parse_response(api).unwrap();
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage, TokenUsage::new(300, 12));
        assert_eq!(response.tool_calls[0].input, serde_json::json!("{item: flash"));
    }

    #[test]
    fn test_parse_response_without_choices() {
        let api: OpenAIResponse = serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(matches!(
            client("x").parse_response(api),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
