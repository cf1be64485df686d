//! Runs the cardwright binary end to end against a temporary workspace.
//!
//! Logs default to a file under the data directory, so stdout carries only command output.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct Sandbox {
    _temp: TempDir,
    root: PathBuf,
    workspace: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let workspace = root.join("ws");
        for dir in ["data", "config", "home", "ws"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        Self {
            _temp: temp,
            root,
            workspace,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cardwright"))
            .env("XDG_DATA_HOME", self.root.join("data"))
            .env("XDG_CONFIG_HOME", self.root.join("config"))
            .env("HOME", self.root.join("home"))
            .env_remove("CARDWRIGHT_LOG")
            .env_remove("CARDWRIGHT_LOG_OUTPUT")
            .arg("--workspace")
            .arg(&self.workspace)
            .arg("--owner")
            .arg("ada")
            .args(args)
            .output()
            .unwrap()
    }

    fn log_file(&self) -> PathBuf {
        self.root.join("data").join("cardwright").join("logs").join("cardwright.log")
    }
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_str(&stdout(output)).unwrap()
}

fn created_id(output: &Output) -> String {
    stdout(output).rsplit(' ').next().unwrap().to_string()
}

#[test]
fn course_workflow_with_generation() {
    let sandbox = Sandbox::new();
    let course = created_id(&sandbox.run(&["course", "create", "Rust basics"]));
    let lesson = created_id(&sandbox.run(&["lesson", "create", &course, "Ownership"]));
    let manual = created_id(&sandbox.run(&[
        "card", "add", &lesson, "--type", "flashcard", "--title", "Move", "--body", "Ownership moves",
    ]));

    let outcome = json(&sandbox.run(&[
        "generate", &lesson, "--count", "3", "--concurrency", "2", "--format", "json",
    ]));
    assert_eq!(outcome["committed"]["count"], 3);

    let cards = json(&sandbox.run(&["card", "list", &lesson, "--format", "json"]));
    let cards = cards.as_array().unwrap();
    assert_eq!(cards.len(), 4);
    assert_eq!(cards[0]["id"].to_string(), manual);

    let mut ids: Vec<String> = cards.iter().map(|c| c["id"].to_string()).collect();
    ids.reverse();
    stdout(&sandbox.run(&["card", "reorder", &lesson, &ids.join(",")]));
    let reordered = json(&sandbox.run(&["card", "list", &lesson, "--format", "json"]));
    assert_eq!(reordered[3]["id"].to_string(), manual);
    assert_eq!(reordered[3]["position"], 3);

    assert!(sandbox.log_file().exists(), "default log file should be written");
}

#[test]
fn draft_review_then_commit() {
    let sandbox = Sandbox::new();
    let course = created_id(&sandbox.run(&["course", "create", "Rust basics"]));
    let lesson = created_id(&sandbox.run(&["lesson", "create", &course, "Traits"]));

    let outcome = json(&sandbox.run(&[
        "generate", &lesson, "--count", "4", "--draft-only", "--format", "json",
    ]));
    let draft_id = outcome["draft_id"].as_str().unwrap().to_string();

    let drafts = json(&sandbox.run(&["draft", "list", "--format", "json"]));
    assert_eq!(drafts[0]["draft_id"], draft_id.as_str());

    stdout(&sandbox.run(&["draft", "commit", &draft_id, "--select", "0,3"]));
    let cards = json(&sandbox.run(&["card", "list", &lesson, "--format", "json"]));
    assert_eq!(cards.as_array().unwrap().len(), 2);
    assert_eq!(cards[1]["title"], outcome["items"][3]["title"]);
}

#[test]
fn invalid_reorder_exits_nonzero() {
    let sandbox = Sandbox::new();
    let course = created_id(&sandbox.run(&["course", "create", "Rust basics"]));
    let first = created_id(&sandbox.run(&["lesson", "create", &course, "One"]));
    created_id(&sandbox.run(&["lesson", "create", &course, "Two"]));

    let output = sandbox.run(&["lesson", "reorder", &course, &first]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Validation failed"), "stderr={}", stderr);
}

