use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const PARALLEL_SESSION: &str = r#"{"id":"m1","kind":"message","timestamp":"2026-02-23T00:00:00Z","content":"split the audit"}
{"id":"s1","kind":"tool_call","timestamp":"2026-02-23T00:00:01.000Z","content":"audit api","metadata":{"toolId":"toolu_a","toolName":"Task"}}
{"id":"s2","kind":"tool_call","timestamp":"2026-02-23T00:00:03.000Z","content":"audit ui","metadata":{"toolId":"toolu_b","toolName":"Task","runInBackground":true}}
{"id":"s3","kind":"tool_call","timestamp":"2026-02-23T00:00:04.500Z","content":"audit docs","metadata":{"toolId":"toolu_c","toolName":"Task"}}
{"id":"n1","kind":"tool_call","timestamp":"2026-02-23T00:00:05Z","metadata":{"toolId":"toolu_read","toolName":"Read","parentToolUseId":"toolu_a"}}
{"id":"n2","kind":"tool_result","timestamp":"2026-02-23T00:00:06Z","metadata":{"toolId":"toolu_read","parentToolUseId":"toolu_a","status":"ok"}}
{"id":"r1","kind":"tool_result","timestamp":"2026-02-23T00:00:07Z","metadata":{"toolId":"toolu_a","status":"completed"}}
{"id":"p1","kind":"tool_call","timestamp":"2026-02-23T00:00:20Z","metadata":{"toolId":"toolu_poll","toolName":"TaskOutput","taskId":"toolu_b"}}
{"id":"p2","kind":"tool_result","timestamp":"2026-02-23T00:00:21Z","metadata":{"toolId":"toolu_poll","status":"completed"}}
{"id":"m2","kind":"message","timestamp":"2026-02-23T00:00:30Z","content":"all audits done"}
"#;

const CUSTOM_TOOL_SESSION: &str = r#"{"id":"s1","kind":"tool_call","timestamp":0,"metadata":{"toolId":"a","toolName":"spawn_agent"}}
{"id":"s2","kind":"tool_call","timestamp":500,"metadata":{"toolId":"b","toolName":"spawn_agent"}}
"#;

fn write_session(name: &str, content: &str) -> (tempfile::TempDir, PathBuf) {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join(name);
    fs::write(&path, content).expect("write");
    (temp, path)
}

fn agroup() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("agroup"));
    cmd.env_remove("AGROUP_SPAWN_TOOL")
        .env_remove("AGROUP_POLL_TOOL")
        .env_remove("AGROUP_PARALLEL_THRESHOLD_MS")
        .env_remove("AGROUP_LOG");
    cmd
}

#[test]
fn default_outputs_markdown() {
    let (_temp, path) = write_session("session.jsonl", PARALLEL_SESSION);

    agroup()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Agent Activity"))
        .stdout(predicate::str::contains("- Events: `10`"))
        .stdout(predicate::str::contains("## 1. Message"))
        .stdout(predicate::str::contains("## 2. Parallel Subagents (2)"))
        .stdout(predicate::str::contains("### 2.1. Subagent `toolu_a`"))
        .stdout(predicate::str::contains("### 2.2. Subagent `toolu_b`"))
        .stdout(predicate::str::contains("- Last Poll Status: `completed`"))
        .stdout(predicate::str::contains("## 3. Subagent `toolu_c`"))
        .stdout(predicate::str::contains("## 4. Message"))
        .stdout(predicate::str::contains("## 5.").not());
}

#[test]
fn raw_outputs_grouped_json() {
    let (_temp, path) = write_session("session.jsonl", PARALLEL_SESSION);

    agroup()
        .arg(&path)
        .arg("--raw")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"parallel_subagents\""))
        .stdout(predicate::str::contains("\"type\": \"subagent\""))
        .stdout(predicate::str::contains("\"lastPollStatus\": \"completed\""))
        .stdout(predicate::str::contains("\"results\""));
}

#[test]
fn threshold_flag_changes_clustering() {
    let (_temp, path) = write_session("session.jsonl", PARALLEL_SESSION);

    agroup()
        .arg(&path)
        .args(["--threshold-ms", "5000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## 2. Parallel Subagents (3)"));
}

#[test]
fn env_config_selects_spawn_tool() {
    let (_temp, path) = write_session("session.jsonl", CUSTOM_TOOL_SESSION);

    agroup()
        .env("AGROUP_SPAWN_TOOL", "spawn_agent")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("## 1. Parallel Subagents (2)"));
}

#[test]
fn spawn_tool_flag_overrides_env() {
    let (_temp, path) = write_session("session.jsonl", CUSTOM_TOOL_SESSION);

    agroup()
        .env("AGROUP_SPAWN_TOOL", "Task")
        .arg(&path)
        .args(["--spawn-tool", "spawn_agent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## 1. Parallel Subagents (2)"));
}

#[test]
fn invalid_env_threshold_returns_non_zero() {
    let (_temp, path) = write_session("session.jsonl", CUSTOM_TOOL_SESSION);

    agroup()
        .env("AGROUP_PARALLEL_THRESHOLD_MS", "soon")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: invalid config value for AGROUP_PARALLEL_THRESHOLD_MS",
        ));
}

#[test]
fn threshold_flag_overrides_invalid_env() {
    let (_temp, path) = write_session("session.jsonl", CUSTOM_TOOL_SESSION);

    agroup()
        .env("AGROUP_PARALLEL_THRESHOLD_MS", "soon")
        .arg(&path)
        .args(["--spawn-tool", "spawn_agent", "--threshold-ms", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## 1. Subagent `a`"))
        .stdout(predicate::str::contains("## 2. Subagent `b`"));
}

#[test]
fn raw_directory_outputs_one_array_with_paths() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("a.jsonl"), PARALLEL_SESSION).expect("write");
    fs::write(temp.path().join("b.jsonl"), CUSTOM_TOOL_SESSION).expect("write");

    let output = agroup()
        .arg(temp.path())
        .arg("--raw")
        .output()
        .expect("run agroup");
    assert!(output.status.success());

    let value = serde_json::from_slice::<serde_json::Value>(&output.stdout).expect("valid json");
    let documents = value.as_array().expect("array");
    assert_eq!(documents.len(), 2);
    assert!(
        documents[0]["path"]
            .as_str()
            .is_some_and(|path| path.ends_with("a.jsonl"))
    );
    assert_eq!(documents[0]["groups"][1]["type"], "parallel_subagents");
    assert!(
        documents[1]["path"]
            .as_str()
            .is_some_and(|path| path.ends_with("b.jsonl"))
    );
    assert_eq!(documents[1]["groups"][0]["type"], "message");
}

#[test]
fn directory_outputs_each_session() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("a.jsonl"), PARALLEL_SESSION).expect("write");
    fs::write(temp.path().join("b.jsonl"), CUSTOM_TOOL_SESSION).expect("write");

    agroup()
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("a.jsonl"))
        .stdout(predicate::str::contains("b.jsonl"))
        .stdout(predicate::str::contains("- Events: `2`"));
}

#[test]
fn invalid_line_returns_non_zero() {
    let (_temp, path) = write_session(
        "session.jsonl",
        "{\"kind\":\"message\",\"timestamp\":0}\nnot json\n",
    );

    agroup()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid json line"))
        .stderr(predicate::str::contains("at line 2"));
}

#[test]
fn missing_path_returns_non_zero() {
    let temp = tempdir().expect("tempdir");

    agroup()
        .arg(temp.path().join("missing.jsonl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: i/o error"));
}

#[test]
fn empty_directory_returns_non_zero() {
    let temp = tempdir().expect("tempdir");

    agroup()
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no session files found"));
}
