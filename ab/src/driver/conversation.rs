//! Driver - runs one model through one interface until a terminal outcome

use runledger::{OpenRun, Outcome, RunRecord, Verdict};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::DriverConfig;
use super::retry::{CallError, call_with_retry};
use crate::interface::{Applied, Interface, RawAction};
use crate::llm::{CompletionRequest, ContentBlock, LlmClient, Message};

/// Opening line of every run, ahead of the first observation
pub const OPENING: &str = "Game started. You are in the airlock.";

/// Tracks identical valid actions in a row
#[derive(Debug, Default)]
struct RepeatTracker {
    last: Option<(String, String)>,
    count: u32,
}

impl RepeatTracker {
    /// Record a valid action; returns the streak length
    fn valid(&mut self, action: &str, observation: &str) -> u32 {
        let same = self
            .last
            .as_ref()
            .is_some_and(|(a, o)| a == action && o == observation);
        if same {
            self.count += 1;
        } else {
            self.last = Some((action.to_string(), observation.to_string()));
            self.count = 1;
        }
        self.count
    }

    fn reset(&mut self) {
        self.last = None;
        self.count = 0;
    }
}

fn repeat_hint(action: &str, count: u32) -> String {
    format!(
        "You have sent '{}' {} times in a row with the same result. Try something different.",
        action, count
    )
}

pub struct Driver {
    client: Arc<dyn LlmClient>,
    config: DriverConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl Driver {
    pub fn new(client: Arc<dyn LlmClient>, config: DriverConfig) -> Self {
        debug!(token_limit = config.token_limit, "Driver::new: called");
        Self {
            client,
            config,
            cancel: None,
        }
    }

    /// Abort the run when the flag turns true
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Play one run and seal its record; the interface is always released
    pub async fn run(&self, mut interface: Box<dyn Interface>, model: &str, label: &str) -> RunRecord {
        let mut run = OpenRun::begin(model, label, interface.mode(), self.config.token_limit);
        info!(run_id = %run.id(), %model, mode = %run.mode(), "Run started");

        let outcome = self.play(interface.as_mut(), &mut run).await;

        if let Err(e) = interface.release() {
            warn!(run_id = %run.id(), error = %e, "Failed to release interface");
        }

        let record = run.seal(outcome);
        info!(
            run_id = %record.id,
            %model,
            mode = %record.mode,
            outcome = %record.outcome,
            tokens = record.total_tokens,
            turns = record.turns,
            "Run finished"
        );
        record
    }

    async fn play(&self, interface: &mut dyn Interface, run: &mut OpenRun) -> Outcome {
        let observation = match interface.render_observation() {
            Ok(observation) => observation,
            Err(e) => return Outcome::InternalError { message: e.to_string() },
        };
        let opening = Message::user(format!("{}\n\n{}", OPENING, observation));
        let mut prompt = opening.text();
        let mut messages = vec![opening];

        let mut invalid_streak = 0u32;
        let mut repeats = RepeatTracker::default();

        loop {
            let turn = run.transcript().len() + 1;
            debug!(run_id = %run.id(), turn, invalid_streak, "play: turn start");

            let request = CompletionRequest {
                system_prompt: interface.system_prompt().to_string(),
                messages: messages.clone(),
                tools: interface.tools(),
                max_tokens: self.config.max_tokens,
            };
            let response = match call_with_retry(self.client.as_ref(), request, &self.config, self.cancel.clone()).await
            {
                Ok(response) => response,
                Err(CallError::Cancelled) => return Outcome::Cancelled,
                Err(CallError::Model(e)) => return Outcome::ModelError { message: e.to_string() },
            };
            let usage = response.usage;
            messages.push(Message::from_response(&response));

            let action = interface.extract(&response);
            let described = action.describe();
            debug!(turn, action = %described, "play: model action");

            if interface.is_terminal_action(&action) {
                run.push_turn(
                    prompt,
                    described,
                    String::new(),
                    Verdict::GiveUp,
                    usage.input_tokens,
                    usage.output_tokens,
                );
                return Outcome::GaveUp;
            }

            let mut applied = match interface.apply(&action).await {
                Ok(applied) => applied,
                Err(e) => {
                    run.push_turn(
                        prompt,
                        described,
                        e.to_string(),
                        Verdict::Invalid,
                        usage.input_tokens,
                        usage.output_tokens,
                    );
                    return Outcome::InternalError { message: e.to_string() };
                }
            };

            let mut hint = None;
            if applied.is_valid() {
                invalid_streak = 0;
                let count = repeats.valid(&described, &applied.observation);
                if count >= self.config.repeat_threshold {
                    let text = repeat_hint(&described, count);
                    applied.observation = format!("{}\n\n{}", applied.observation, text);
                    hint = Some(text);
                }
            } else {
                invalid_streak += 1;
                repeats.reset();
            }

            let reply = reply_message(&applied, hint, &action);
            run.push_turn(
                std::mem::replace(&mut prompt, reply.text()),
                described,
                applied.observation,
                applied.verdict,
                usage.input_tokens,
                usage.output_tokens,
            );
            messages.push(reply);

            if run.total_tokens() > self.config.token_limit {
                debug!(total = run.total_tokens(), "play: token limit exceeded");
                return Outcome::TokenLimit;
            }
            if interface.engine().is_won() {
                return Outcome::Won;
            }
            if invalid_streak >= self.config.max_invalid {
                return Outcome::TooManyInvalid;
            }
        }
    }
}

/// User-side message answering the model's last response
fn reply_message(applied: &Applied, hint: Option<String>, action: &RawAction) -> Message {
    if applied.tool_results.is_empty() || !matches!(action, RawAction::Calls(_)) {
        return Message::user(applied.observation.clone());
    }
    let mut blocks = applied.tool_results.clone();
    if let Some(hint) = hint {
        blocks.push(ContentBlock::text(hint));
    }
    Message::user_blocks(blocks)
}
