//! DriverConfig - per-run limits resolved from EvalConfig

use runledger::Mode;
use std::time::Duration;

use crate::config::EvalConfig;

/// Consecutive invalid actions that end a run
pub const MAX_CONSECUTIVE_INVALID: u32 = 5;

/// Identical valid actions in a row before the model gets a hint
pub const REPEAT_HINT_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Cumulative input+output tokens allowed per run
    pub token_limit: u64,

    /// Attempts per model call, first one included
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt
    pub backoff: Duration,

    pub call_timeout: Duration,

    /// Output cap for each call
    pub max_tokens: u32,

    pub max_invalid: u32,

    pub repeat_threshold: u32,
}

impl DriverConfig {
    pub fn from_eval(eval: &EvalConfig, mode: Mode) -> Self {
        Self {
            token_limit: eval.token_limit,
            max_attempts: eval.max_attempts.max(1),
            backoff: eval.backoff(),
            call_timeout: eval.call_timeout(),
            max_tokens: match mode {
                Mode::Shell => eval.shell_max_tokens,
                Mode::Structured => eval.structured_max_tokens,
            },
            ..Self::default()
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            token_limit: 50_000,
            max_attempts: 3,
            backoff: Duration::from_millis(1000),
            call_timeout: Duration::from_secs(120),
            max_tokens: 256,
            max_invalid: MAX_CONSECUTIVE_INVALID,
            repeat_threshold: REPEAT_HINT_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_eval_picks_mode_cap() {
        let eval = EvalConfig {
            token_limit: 1234,
            ..EvalConfig::default()
        };
        let shell = DriverConfig::from_eval(&eval, Mode::Shell);
        assert_eq!(shell.max_tokens, 64);
        assert_eq!(shell.token_limit, 1234);
        assert_eq!(shell.max_invalid, 5);

        let structured = DriverConfig::from_eval(&eval, Mode::Structured);
        assert_eq!(structured.max_tokens, 256);
        assert_eq!(structured.call_timeout, Duration::from_secs(120));
    }
}
