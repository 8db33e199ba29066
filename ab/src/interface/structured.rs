//! Structured-call adapter: one validated tool call per turn

use async_trait::async_trait;
use runledger::Mode;
use serde_json::Value;
use tracing::debug;

use super::{Applied, Interface, InterfaceError, RawAction};
use crate::llm::{CompletionResponse, ContentBlock, ToolCall, ToolDefinition};
use crate::world::{Engine, EngineError};

const SYSTEM_PROMPT: &str = "You are exploring a damaged space station in a text adventure. \
Interact with the world only through the provided tools: look around or examine an item, go in a \
direction, take items, use items, read items you carry and check your inventory.

Call exactly one tool per message. Item names are the ones shown in room descriptions. \
Your goal is to get the station's distress beacon working. If you decide to stop, reply with the \
text GIVE_UP and no tool call.";

pub const NO_TOOL_CALL: &str = "No tool call found. Use the available tools to interact with the game.";

/// A tool call that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Look(Option<String>),
    Go(String),
    Take(String),
    Use(String),
    Read(String),
    Inventory,
}

/// Item names match case-insensitively with spaces or underscores
fn normalize_item(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn item_schema(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "item": { "type": "string", "description": description }
        },
        "required": ["item"],
        "additionalProperties": false
    })
}

/// The fixed tool vocabulary
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "look",
            "Describe the current room, its exits and items. Pass an item to examine it instead.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "item": { "type": "string", "description": "Optional item to examine" }
                },
                "additionalProperties": false
            }),
        ),
        ToolDefinition::new(
            "go",
            "Move through an exit of the current room.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "direction": { "type": "string", "description": "Exit direction, e.g. north" }
                },
                "required": ["direction"],
                "additionalProperties": false
            }),
        ),
        ToolDefinition::new(
            "take",
            "Pick up an item in the current room.",
            item_schema("Item to pick up"),
        ),
        ToolDefinition::new(
            "use",
            "Use an item you carry, or one fixed in the current room.",
            item_schema("Item to use"),
        ),
        ToolDefinition::new("read", "Read an item you carry.", item_schema("Item to read")),
        ToolDefinition::new(
            "inventory",
            "List the items you carry.",
            serde_json::json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        ),
    ]
}

/// Check a call against the vocabulary; `Err` is the message shown to the model
fn validate(call: &ToolCall) -> Result<Op, String> {
    let (allowed, required): (&[&str], &[&str]) = match call.name.as_str() {
        "look" => (&["item"], &[]),
        "go" => (&["direction"], &["direction"]),
        "take" | "use" | "read" => (&["item"], &["item"]),
        "inventory" => (&[], &[]),
        other => {
            return Err(format!(
                "Unknown tool '{}'. Available tools: look, go, take, use, read, inventory.",
                other
            ));
        }
    };

    let empty = serde_json::Map::new();
    let args = match &call.input {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(format!("Arguments for '{}' must be an object.", call.name)),
    };

    if let Some(extra) = args.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(format!("Unexpected argument '{}' for '{}'.", extra, call.name));
    }
    for name in required {
        if !args.contains_key(*name) {
            return Err(format!("Missing required argument '{}' for '{}'.", name, call.name));
        }
    }

    let string_arg = |name: &str| -> Result<Option<String>, String> {
        match args.get(name) {
            None => Ok(None),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
            Some(_) => Err(format!("Argument '{}' for '{}' must be a non-empty string.", name, call.name)),
        }
    };
    let required_arg = |name: &str| -> Result<String, String> {
        string_arg(name)?.ok_or_else(|| format!("Missing required argument '{}' for '{}'.", name, call.name))
    };

    Ok(match call.name.as_str() {
        "look" => Op::Look(string_arg("item")?.as_deref().map(normalize_item)),
        "go" => Op::Go(required_arg("direction")?.trim().to_lowercase()),
        "take" => Op::Take(normalize_item(&required_arg("item")?)),
        "use" => Op::Use(normalize_item(&required_arg("item")?)),
        "read" => Op::Read(normalize_item(&required_arg("item")?)),
        _ => Op::Inventory,
    })
}

pub struct StructuredInterface {
    engine: Engine,
}

impl StructuredInterface {
    pub fn new(engine: Engine) -> Self {
        debug!("StructuredInterface::new: called");
        Self { engine }
    }

    fn execute(&mut self, op: Op) -> Result<String, EngineError> {
        debug!(?op, room = %self.engine.room(), "execute: called");
        match op {
            Op::Look(None) => self.engine.look(),
            Op::Look(Some(item)) => self.engine.inspect(&item),
            Op::Go(direction) => self.engine.move_to(&direction),
            Op::Take(item) => self.engine.take(&item),
            Op::Use(item) => self.engine.use_item(&item),
            Op::Read(item) => self.engine.read(&item),
            Op::Inventory => Ok(self.engine.inventory_text()),
        }
    }

    fn apply_call(&mut self, call: &ToolCall) -> Result<Applied, InterfaceError> {
        let outcome = match validate(call) {
            Ok(op) => match self.execute(op) {
                Ok(observation) => Ok(observation),
                Err(EngineError::UnknownRoom(room)) => {
                    return Err(InterfaceError::Inconsistent(format!("unknown room {}", room)));
                }
                Err(refusal) => Err(refusal.to_string()),
            },
            Err(message) => Err(message),
        };

        let mut applied = match outcome {
            Ok(observation) => Applied::valid(observation),
            Err(message) => Applied::invalid(message),
        };
        applied.tool_results = vec![ContentBlock::tool_result(
            &call.id,
            &applied.observation,
            !applied.is_valid(),
        )];
        Ok(applied)
    }
}

#[async_trait]
impl Interface for StructuredInterface {
    fn mode(&self) -> Mode {
        Mode::Structured
    }

    fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    fn extract(&self, response: &CompletionResponse) -> RawAction {
        if !response.tool_calls.is_empty() {
            return RawAction::Calls(response.tool_calls.clone());
        }
        match response.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => RawAction::Text(text.to_string()),
            _ => RawAction::Empty,
        }
    }

    async fn apply(&mut self, action: &RawAction) -> Result<Applied, InterfaceError> {
        match action {
            RawAction::Calls(calls) if calls.len() == 1 => self.apply_call(&calls[0]),
            RawAction::Calls(calls) => {
                let message = format!("Only one tool call per turn is allowed. Received {}.", calls.len());
                let mut applied = Applied::invalid(&message);
                applied.tool_results = calls
                    .iter()
                    .map(|call| ContentBlock::tool_result(&call.id, &message, true))
                    .collect();
                Ok(applied)
            }
            _ => Ok(Applied::invalid(NO_TOOL_CALL)),
        }
    }

    fn engine(&self) -> &Engine {
        &self.engine
    }

    fn release(&mut self) -> Result<(), InterfaceError> {
        Ok(())
    }
}
