//! Model calls with timeout, bounded retry and cancellation

use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::DriverConfig;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};

/// Why a model call produced no response
#[derive(Debug)]
pub enum CallError {
    Cancelled,
    Model(LlmError),
}

/// Resolves once the flag turns true; never resolves without a sender
pub async fn cancelled(cancel: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = cancel else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

/// Delay before the next attempt; a rate limit's retry-after wins
pub fn backoff_delay(base: Duration, attempt: u32, error: &LlmError) -> Duration {
    if let Some(after) = error.retry_after() {
        return after;
    }
    let exp = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    let spread = (exp.as_millis() / 4) as u64;
    exp + Duration::from_millis(rand::rng().random_range(0..=spread))
}

pub async fn call_with_retry(
    client: &dyn LlmClient,
    request: CompletionRequest,
    config: &DriverConfig,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<CompletionResponse, CallError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        debug!(attempt, max_attempts = config.max_attempts, "call_with_retry: calling model");

        // cancellation is polled first so a raised flag always wins over a ready reply
        let result = tokio::select! {
            biased;
            _ = cancelled(cancel.clone()) => return Err(CallError::Cancelled),
            result = tokio::time::timeout(config.call_timeout, client.complete(request.clone())) => {
                result.unwrap_or(Err(LlmError::Timeout(config.call_timeout)))
            }
        };

        match result {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let delay = backoff_delay(config.backoff, attempt, &e);
                warn!(attempt, error = %e, ?delay, "call_with_retry: retrying model call");
                tokio::select! {
                    biased;
                    _ = cancelled(cancel.clone()) => return Err(CallError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                debug!(attempt, error = %e, "call_with_retry: giving up");
                return Err(CallError::Model(e));
            }
        }
    }
}
