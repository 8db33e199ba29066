//! End-to-end tests for the ab binary that need no model provider

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::{TempDir, tempdir};

fn empty_config(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("adventbench.yml");
    fs::write(&path, "{}\n").unwrap();
    path
}

fn ab(config: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("ab").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn test_reset_materializes_station() {
    let temp = tempdir().unwrap();
    let config = empty_config(&temp);
    let game = temp.path().join("game");

    ab(&config)
        .args(["reset", "--dir"])
        .arg(&game)
        .assert()
        .success()
        .stdout(predicate::str::contains("Station reset"));

    let readme = fs::read_to_string(game.join("station").join("airlock").join("README")).unwrap();
    assert!(readme.starts_with("Airlock"));
    assert!(game.join("station").join("engine_room").join("flashlight").exists());
    assert!(game.join("station").join("inventory").is_dir());

    // second reset over an existing tree
    ab(&config).args(["reset", "--dir"]).arg(&game).assert().success();
}

#[test]
fn test_run_fails_fast_on_unknown_provider() {
    let temp = tempdir().unwrap();
    let config = empty_config(&temp);
    let runs = temp.path().join("runs");

    ab(&config)
        .args(["run", "--model", "nosuchprovider/some-model", "--log-dir"])
        .arg(&runs)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider 'nosuchprovider'"));

    assert!(!runs.exists());
}

#[test]
fn test_run_rejects_zero_token_limit() {
    let temp = tempdir().unwrap();
    let config = empty_config(&temp);

    ab(&config)
        .args(["run", "--model", "openai/gpt-4o", "--token-limit", "0", "--log-dir"])
        .arg(temp.path().join("runs"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("token-limit must be greater than 0"));
}

#[test]
fn test_models_lists_labels() {
    let temp = tempdir().unwrap();
    let config = empty_config(&temp);
    let models = temp.path().join("models.yaml");
    fs::write(
        &models,
        "models:\n  - name: openrouter/google/gemini-2.5-flash\n    label: gemini-flash\n  - name: openai/gpt-4o\n",
    )
    .unwrap();

    ab(&config)
        .arg("models")
        .arg("--models-file")
        .arg(&models)
        .assert()
        .success()
        .stdout(predicate::str::contains("gemini-flash"))
        .stdout(predicate::str::contains("openrouter/google/gemini-2.5-flash"))
        .stdout(predicate::str::contains("openai/gpt-4o"));
}

#[test]
fn test_report_on_empty_store() {
    let temp = tempdir().unwrap();
    let config = empty_config(&temp);

    ab(&config)
        .args(["report", "--log-dir"])
        .arg(temp.path().join("runs"))
        .assert()
        .success();
}
