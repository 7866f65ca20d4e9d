// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use kitsync::Config;
use kitsync::hunk::{HunkPrompt, HunkReviewer, ReviewDecision};
use kitsync::reconcile::{ReconcileRequest, Reconciler};
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const KIT: &str = "engineer";

/// A kit source directory and an install target under one temp dir.
///
/// Keep the struct alive for the duration of the test to prevent cleanup.
pub struct TestEnv {
    _temp_dir: TempDir,
    pub source: PathBuf,
    pub target: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("kit");
        let target = temp_dir.path().join("home").join(".claude");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();

        Self {
            _temp_dir: temp_dir,
            source,
            target,
        }
    }

    /// Small pool so tests don't spawn a thread per core
    pub fn config(&self) -> Config {
        Config {
            concurrency: 4,
            ..Config::default()
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(&self.target, self.config()).unwrap()
    }

    pub fn reconciler_with(&self, config: Config) -> Reconciler {
        Reconciler::new(&self.target, config).unwrap()
    }

    pub fn request(&self, version: &str) -> ReconcileRequest {
        ReconcileRequest::new(KIT, version, &self.source)
    }

    /// Replace the kit source with exactly these files
    pub fn ship(&self, files: &[(&str, &str)]) {
        fs::remove_dir_all(&self.source).unwrap();
        fs::create_dir_all(&self.source).unwrap();
        for (path, content) in files {
            write_file(&self.source.join(path), content);
        }
    }

    pub fn ship_settings(&self, settings: &Value) {
        write_file(
            &self.source.join("settings.json"),
            &serde_json::to_string_pretty(settings).unwrap(),
        );
    }

    pub fn write_target(&self, path: &str, content: &str) {
        write_file(&self.target.join(path), content);
    }

    pub fn read_target(&self, path: &str) -> String {
        fs::read_to_string(self.target.join(path)).unwrap()
    }

    pub fn target_exists(&self, path: &str) -> bool {
        self.target.join(path).exists()
    }

    pub fn write_live_settings(&self, settings: &Value) {
        self.write_target("settings.json", &serde_json::to_string_pretty(settings).unwrap());
    }

    pub fn live_settings(&self) -> Value {
        serde_json::from_str(&self.read_target("settings.json")).unwrap()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.target
            .join(".kitsync")
            .join("kits")
            .join(KIT)
            .join("manifest.json")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.target.join(".kitsync").join("locks")
    }
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Settings fragment with one SessionStart hook per command
pub fn hook_settings(commands: &[&str]) -> Value {
    let hooks: Vec<Value> = commands
        .iter()
        .map(|c| serde_json::json!({"type": "command", "command": c}))
        .collect();
    serde_json::json!({
        "hooks": {
            "SessionStart": [{"matcher": "startup", "hooks": hooks}]
        }
    })
}

/// Every hook command in a settings value, in document order
pub fn hook_commands(settings: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(events) = settings.get("hooks").and_then(Value::as_object) {
        for groups in events.values() {
            for group in groups.as_array().into_iter().flatten() {
                for hook in group["hooks"].as_array().into_iter().flatten() {
                    if let Some(command) = hook["command"].as_str() {
                        out.push(command.to_string());
                    }
                }
            }
        }
    }
    out
}

/// Reviewer that replays a fixed list of answers and records what it saw.
///
/// Runs out of answers by rejecting.
pub struct ScriptedReviewer {
    answers: VecDeque<ReviewDecision>,
    pub seen: Vec<(String, usize, usize)>,
}

impl ScriptedReviewer {
    pub fn new(answers: &[ReviewDecision]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            seen: Vec::new(),
        }
    }
}

impl HunkReviewer for ScriptedReviewer {
    fn review(&mut self, prompt: &HunkPrompt<'_>) -> kitsync::Result<ReviewDecision> {
        self.seen
            .push((prompt.label.to_string(), prompt.index, prompt.extra_context));
        Ok(self.answers.pop_front().unwrap_or(ReviewDecision::Reject))
    }
}
