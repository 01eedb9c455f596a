#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temp workspace with an isolated HOME so no global config leaks in.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self { dir: TempDir::new().unwrap() }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tuneforge").unwrap();
        cmd.current_dir(self.path()).env("HOME", self.path()).arg("--workspace").arg(self.path());
        for var in [
            "TUNEFORGE_STREAMING_ENABLED",
            "TUNEFORGE_BATCH_SIZE",
            "TUNEFORGE_MAX_CONCURRENT_JOBS",
            "TUNEFORGE_APPROVAL_THRESHOLD",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn golden_file(&self) -> PathBuf {
        let lines = [
            json!({"prompt": "What is consideration?", "expected_output": "Something of value exchanged."}),
            json!({"prompt": "Define tort.", "expected_output": "A civil wrong.", "difficulty": "easy"}),
        ];
        let body: Vec<String> = lines.iter().map(ToString::to_string).collect();
        self.write("golden.jsonl", &(body.join("\n") + "\n"))
    }

    pub fn artifact(&self, name: &str, contents: &str) -> PathBuf {
        self.write(name, contents)
    }

    /// Runs a command with `--json` and parses stdout.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.cmd().arg("--json").args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).expect("stdout should be valid JSON")
    }
}
