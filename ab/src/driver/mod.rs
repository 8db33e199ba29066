//! Conversation driver
//!
//! One run is strictly sequential: prompt, one model call, one action through
//! the active interface, termination check. Runs share nothing but the
//! record store.

mod config;
mod conversation;
mod retry;

pub use config::{DriverConfig, MAX_CONSECUTIVE_INVALID, REPEAT_HINT_THRESHOLD};
pub use conversation::{Driver, OPENING};
pub use retry::{CallError, backoff_delay, call_with_retry};
