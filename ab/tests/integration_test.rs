//! Integration tests for AdventBench
//!
//! Full runs against scripted model clients: driver, both interfaces, the
//! recorder and the runledger aggregates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use adventbench::interface::{self, Applied, Interface, InterfaceError, Projection, RawAction, ShellInterface};
use adventbench::llm::{
    CompletionResponse, LlmError, MockLlmClient, ScriptStep, TokenUsage, ToolCall, ToolDefinition,
};
use adventbench::{Driver, DriverConfig, Engine, Recorder};
use async_trait::async_trait;
use runledger::{Mode, Outcome, Report, RunRecord, RunStore, Verdict, aggregate, leaderboard};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::watch;

const SHELL_SOLUTION: [&str; 8] = [
    "cd north",
    "cd east",
    "./flashlight",
    "./flashlight",
    "./keycard",
    "cd west",
    "cd north",
    "../inventory/keycard",
];

fn config() -> DriverConfig {
    DriverConfig {
        backoff: Duration::from_millis(1),
        call_timeout: Duration::from_secs(5),
        ..DriverConfig::default()
    }
}

fn say(text: &str, input: u64, output: u64) -> CompletionResponse {
    CompletionResponse::text(text, TokenUsage::new(input, output))
}

fn call(n: usize, name: &str, input: serde_json::Value) -> CompletionResponse {
    CompletionResponse::tool(ToolCall::new(format!("call_{}", n), name, input), TokenUsage::new(100, 10))
}

fn structured_solution() -> Vec<CompletionResponse> {
    vec![
        call(0, "go", json!({"direction": "north"})),
        call(1, "go", json!({"direction": "east"})),
        call(2, "take", json!({"item": "flashlight"})),
        call(3, "use", json!({"item": "flashlight"})),
        call(4, "take", json!({"item": "keycard"})),
        call(5, "go", json!({"direction": "west"})),
        call(6, "go", json!({"direction": "north"})),
        call(7, "use", json!({"item": "keycard"})),
    ]
}

async fn play(mode: Mode, script: Vec<ScriptStep>, config: DriverConfig) -> (RunRecord, Arc<MockLlmClient>) {
    let client = Arc::new(MockLlmClient::scripted(script));
    let driver = Driver::new(client.clone(), config);
    let record = driver
        .run(interface::create(mode).expect("Failed to create interface"), "mock/model", "mock")
        .await;
    (record, client)
}

fn replies(responses: Vec<CompletionResponse>) -> Vec<ScriptStep> {
    responses.into_iter().map(ScriptStep::Reply).collect()
}

/// Interface wrapper that records whether the driver released it
struct Tracked {
    inner: Box<dyn Interface>,
    released: Arc<AtomicBool>,
}

#[async_trait]
impl Interface for Tracked {
    fn mode(&self) -> Mode {
        self.inner.mode()
    }

    fn system_prompt(&self) -> &'static str {
        self.inner.system_prompt()
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.inner.tools()
    }

    fn extract(&self, response: &CompletionResponse) -> RawAction {
        self.inner.extract(response)
    }

    async fn apply(&mut self, action: &RawAction) -> Result<Applied, InterfaceError> {
        self.inner.apply(action).await
    }

    fn engine(&self) -> &Engine {
        self.inner.engine()
    }

    fn release(&mut self) -> Result<(), InterfaceError> {
        self.released.store(true, Ordering::SeqCst);
        self.inner.release()
    }
}

// =============================================================================
// Full runs
// =============================================================================

#[tokio::test]
async fn test_shell_run_wins() {
    let script = SHELL_SOLUTION.iter().map(|line| say(line, 100, 10)).collect();
    let (record, client) = play(Mode::Shell, replies(script), config()).await;

    assert_eq!(record.outcome, Outcome::Won);
    assert_eq!(record.mode, Mode::Shell);
    assert_eq!(record.turns, 8);
    assert_eq!(record.invalid_turns, 0);
    assert_eq!(record.transcript.len(), 8);
    assert_eq!(record.total_tokens, 880);
    assert_eq!(record.total_tokens, record.input_tokens + record.output_tokens);
    assert!(record.transcript.last().unwrap().observation.contains("YOU WIN"));
    assert_eq!(client.call_count(), 8);
}

#[tokio::test]
async fn test_structured_run_wins() {
    let (record, client) = play(Mode::Structured, replies(structured_solution()), config()).await;

    assert_eq!(record.outcome, Outcome::Won);
    assert_eq!(record.turns, 8);
    assert_eq!(record.total_tokens, 880);
    assert!(client.requests().iter().all(|r| r.tools.len() == 6));
}

#[tokio::test]
async fn test_give_up_on_third_turn() {
    let script = vec![say("ls", 10, 1), say("cat README", 20, 2), say("GIVE_UP", 30, 3)];
    let (record, _) = play(Mode::Shell, replies(script), config()).await;

    assert_eq!(record.outcome, Outcome::GaveUp);
    assert_eq!(record.transcript.len(), 3);
    assert_eq!(record.turns, 2);
    assert_eq!(record.total_tokens, 66);
    assert_eq!(record.transcript[2].verdict, Verdict::GiveUp);
}

#[tokio::test]
async fn test_token_limit_wins_over_winning_turn() {
    let mut script: Vec<CompletionResponse> = SHELL_SOLUTION[..7].iter().map(|line| say(line, 100, 10)).collect();
    script.push(say(SHELL_SOLUTION[7], 400, 100));

    let config = DriverConfig {
        token_limit: 1000,
        ..config()
    };
    let (record, _) = play(Mode::Shell, replies(script), config).await;

    assert_eq!(record.outcome, Outcome::TokenLimit);
    assert_eq!(record.total_tokens, 1270);
    assert_eq!(record.token_limit, 1000);
    assert!(record.transcript.last().unwrap().observation.contains("YOU WIN"));
}

#[tokio::test]
async fn test_reaching_the_limit_exactly_is_not_exceeding_it() {
    let script = SHELL_SOLUTION.iter().map(|line| say(line, 100, 25)).collect();
    let config = DriverConfig {
        token_limit: 1000,
        ..config()
    };
    let (record, _) = play(Mode::Shell, replies(script), config).await;

    assert_eq!(record.total_tokens, 1000);
    assert_eq!(record.outcome, Outcome::Won);
}

#[tokio::test]
async fn test_five_invalid_actions_end_the_run() {
    let script = (0..5).map(|_| say("rm -rf /", 10, 1)).collect();
    let (record, client) = play(Mode::Shell, replies(script), config()).await;

    assert_eq!(record.outcome, Outcome::TooManyInvalid);
    assert_eq!(record.turns, 0);
    assert_eq!(record.invalid_turns, 5);
    assert_eq!(client.call_count(), 5);
    assert!(record.transcript.iter().all(|t| t.verdict == Verdict::Invalid));
}

#[tokio::test]
async fn test_structured_text_reply_counts_as_invalid() {
    let script = (0..5).map(|_| say("I will go north now.", 10, 1)).collect();
    let (record, _) = play(Mode::Structured, replies(script), config()).await;

    assert_eq!(record.outcome, Outcome::TooManyInvalid);
    assert!(record.transcript[0].observation.contains("No tool call found"));
}

#[tokio::test]
async fn test_model_error_after_retries() {
    let script = (0..3)
        .map(|_| {
            ScriptStep::Fail(LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string(),
            })
        })
        .collect();
    let (record, client) = play(Mode::Structured, script, config()).await;

    assert!(matches!(record.outcome, Outcome::ModelError { .. }));
    assert!(record.outcome.is_run_failure());
    assert_eq!(client.call_count(), 3);
    assert!(record.transcript.is_empty());
}

#[tokio::test]
async fn test_transient_failure_then_win() {
    let mut script = vec![ScriptStep::Fail(LlmError::RateLimited {
        retry_after: Duration::from_millis(5),
    })];
    script.extend(replies(structured_solution()));
    let (record, client) = play(Mode::Structured, script, config()).await;

    assert_eq!(record.outcome, Outcome::Won);
    assert_eq!(client.call_count(), 9);
    assert_eq!(record.transcript.len(), 8);
}

#[tokio::test]
async fn test_cancellation_releases_interface() {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let client = Arc::new(MockLlmClient::scripted(vec![
        ScriptStep::Reply(say("cd north", 10, 1)),
        ScriptStep::Hang,
    ]));
    let driver = Driver::new(client.clone(), config()).with_cancel(cancel_rx);

    let released = Arc::new(AtomicBool::new(false));
    let tracked = Tracked {
        inner: interface::create(Mode::Shell).unwrap(),
        released: released.clone(),
    };

    let handle = tokio::spawn(async move { driver.run(Box::new(tracked), "mock/model", "mock").await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_tx.send(true).unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run should stop after cancel")
        .unwrap();
    assert_eq!(record.outcome, Outcome::Cancelled);
    assert_eq!(record.transcript.len(), 1);
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_pre_cancelled_run_never_plays() {
    let (_cancel_tx, cancel_rx) = watch::channel(true);
    let client = Arc::new(MockLlmClient::new(vec![say("cd north", 10, 1), say("ls", 10, 1)]));
    let driver = Driver::new(client.clone(), config()).with_cancel(cancel_rx);

    let record = driver
        .run(interface::create(Mode::Shell).unwrap(), "mock/model", "mock")
        .await;
    assert_eq!(record.outcome, Outcome::Cancelled);
    assert!(record.transcript.is_empty());
    assert_eq!(record.total_tokens, 0);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_drifted_projection_is_internal_error() {
    let shell = ShellInterface::new(Engine::station()).unwrap();
    let airlock = shell.projection().room_dir("airlock");
    std::fs::remove_file(airlock.join("north")).unwrap();
    std::fs::write(airlock.join("warp_drive"), "humming").unwrap();
    let root = shell.projection().root().to_path_buf();

    let client = Arc::new(MockLlmClient::new(vec![say("ls", 10, 1), say("cd north", 10, 1)]));
    let driver = Driver::new(client.clone(), config());
    let released = Arc::new(AtomicBool::new(false));
    let tracked = Tracked {
        inner: Box::new(shell),
        released: released.clone(),
    };

    let record = driver.run(Box::new(tracked), "mock/model", "mock").await;
    assert!(matches!(record.outcome, Outcome::InternalError { ref message } if message.contains("airlock")));
    assert_eq!(record.transcript.len(), 1);
    assert_eq!(record.transcript[0].verdict, Verdict::Invalid);
    assert_eq!(record.total_tokens, 11);
    assert_eq!(client.call_count(), 1);
    assert!(released.load(Ordering::SeqCst));
    assert!(!root.exists());
}

#[tokio::test]
async fn test_finished_run_releases_interface() {
    let client = Arc::new(MockLlmClient::new(vec![say("GIVE_UP", 10, 1)]));
    let driver = Driver::new(client, config());
    let released = Arc::new(AtomicBool::new(false));
    let tracked = Tracked {
        inner: interface::create(Mode::Shell).unwrap(),
        released: released.clone(),
    };

    let record = driver.run(Box::new(tracked), "mock/model", "mock").await;
    assert_eq!(record.outcome, Outcome::GaveUp);
    assert!(released.load(Ordering::SeqCst));
}

// =============================================================================
// Adapter equivalence
// =============================================================================

#[tokio::test]
async fn test_both_adapters_reach_the_same_state() {
    let mut shell = interface::create(Mode::Shell).unwrap();
    let mut structured = interface::create(Mode::Structured).unwrap();

    let pairs: Vec<(&str, &str, serde_json::Value)> = vec![
        ("cat README", "look", json!({})),
        ("cd north", "go", json!({"direction": "north"})),
        ("cd east", "go", json!({"direction": "east"})),
        ("./flashlight", "take", json!({"item": "flashlight"})),
        ("../inventory/flashlight", "use", json!({"item": "flashlight"})),
        ("cat README", "look", json!({})),
        ("./keycard", "take", json!({"item": "keycard"})),
        ("cd down", "go", json!({"direction": "down"})),
        ("cd up", "go", json!({"direction": "up"})),
        ("cd west", "go", json!({"direction": "west"})),
        ("cd north", "go", json!({"direction": "north"})),
        ("./console", "use", json!({"item": "console"})),
    ];

    for (i, (line, tool, input)) in pairs.into_iter().enumerate() {
        let a = shell.apply(&RawAction::Command(line.to_string())).await.unwrap();
        let b = structured
            .apply(&RawAction::Calls(vec![ToolCall::new(format!("t{}", i), tool, input)]))
            .await
            .unwrap();
        assert_eq!(a.verdict, b.verdict, "{} vs {}", line, tool);
        assert_eq!(a.observation, b.observation, "{} vs {}", line, tool);
        assert_eq!(shell.engine().state(), structured.engine().state(), "after {}", line);
    }
    assert!(shell.engine().is_won());
    assert!(structured.engine().is_won());

    shell.release().unwrap();
    structured.release().unwrap();
}

#[tokio::test]
async fn test_invalid_actions_leave_state_unchanged() {
    let mut shell = interface::create(Mode::Shell).unwrap();
    let before = shell.engine().state();
    for line in ["cd south", "./keycard", "cat nothing", "ls; rm README", "vim README", ""] {
        let applied = shell.apply(&RawAction::Command(line.to_string())).await.unwrap();
        assert!(!applied.is_valid(), "{}", line);
    }
    assert_eq!(shell.engine().state(), before);
    shell.release().unwrap();
}

// =============================================================================
// Projection reset
// =============================================================================

#[test]
fn test_reset_is_idempotent_and_repairs_tampering() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let engine = Engine::station();
    let mut projection = Projection::at(temp.path().join("game"));

    projection.reset(&engine).unwrap();
    let pristine = projection.snapshot().unwrap();
    projection.reset(&engine).unwrap();
    assert_eq!(projection.snapshot().unwrap(), pristine);

    std::fs::write(projection.room_dir("airlock").join("README"), "tampered").unwrap();
    std::fs::remove_file(projection.room_dir("engine_room").join("flashlight")).unwrap();
    std::fs::write(projection.inventory_dir().join("keycard"), "stolen").unwrap();
    assert!(projection.verify(&engine).is_err());

    projection.reset(&engine).unwrap();
    assert_eq!(projection.snapshot().unwrap(), pristine);
    projection.verify(&engine).unwrap();
}

// =============================================================================
// Recording and aggregation
// =============================================================================

#[tokio::test]
async fn test_recorded_runs_aggregate_into_report() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let recorder = Recorder::spawn(temp.path()).unwrap();

    let shell_win = SHELL_SOLUTION.iter().map(|line| say(line, 100, 10)).collect();
    let (won, _) = play(Mode::Shell, replies(shell_win), config()).await;
    let (gave_up, _) = play(Mode::Shell, replies(vec![say("GIVE_UP", 10, 1)]), config()).await;
    let (structured, _) = play(Mode::Structured, replies(structured_solution()), config()).await;

    for record in [won, gave_up, structured] {
        let path = recorder.append(record).await.unwrap();
        assert!(path.starts_with(temp.path()));
    }
    assert_eq!(recorder.count().await.unwrap(), 3);
    recorder.shutdown().await.unwrap();

    let loaded = RunStore::open(temp.path()).unwrap().load().unwrap();
    assert!(loaded.warnings.is_empty());
    assert_eq!(loaded.records.len(), 3);

    let rows = aggregate(&loaded.records);
    let shell = rows.iter().find(|r| r.mode == Mode::Shell).unwrap();
    assert_eq!(shell.runs, 2);
    assert_eq!(shell.wins, 1);
    assert_eq!(shell.win_rate, 0.5);
    assert_eq!(shell.avg_tokens_to_win, Some(880.0));

    let board = leaderboard(&rows);
    assert_eq!(board.ranked.len(), 2);
    assert!(board.no_wins.is_empty());

    let text = Report::build(&loaded).render_text();
    assert!(text.contains("mock"));
}
