// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for specs.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

pub use tempfile::TempDir;

/// Env vars the supervisor hands to children; specs start roles by hand.
const HANDOFF_VARS: &[&str] = &["JOB_ITEM_CONFIG_DATA", "JOB_ITEM_IDENTITY_ID", "JOB_ITEM_SUPERVISOR_PID", "CONFIG_PATH"];

/// Path to the `job-item` binary, building it once if this test run did
/// not already.
pub fn binary() -> &'static Path {
    static BINARY: OnceLock<PathBuf> = OnceLock::new();
    BINARY.get_or_init(|| {
        let built = assert_cmd::cargo::cargo_bin("job-item");
        if !built.exists() {
            let status = std::process::Command::new(env!("CARGO"))
                .args(["build", "--quiet", "-p", "ji-daemon", "--bin", "job-item"])
                .status()
                .expect("cargo build should run");
            assert!(status.success(), "building job-item failed");
        }
        built
    })
}

/// A `job-item` command with a clean environment and a timeout.
pub fn cli() -> Command {
    let mut cmd = Command::new(binary());
    for var in HANDOFF_VARS {
        cmd.env_remove(var);
    }
    cmd.timeout(Duration::from_secs(20));
    cmd
}

/// Temporary agent directory holding a config file.
pub struct Agent {
    dir: TempDir,
}

impl Agent {
    pub fn with_config(yaml: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.yaml"), yaml).expect("write config");
        Self { dir }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `job-item <args..> --config <this config>`, run in the agent dir.
    pub fn job_item(&self, args: &[&str]) -> Command {
        let mut cmd = cli();
        cmd.args(args).arg("--config").arg(self.config_path()).current_dir(self.path());
        cmd
    }
}

/// Assertion helpers over a finished run.
pub trait RunExt {
    fn passes(&mut self) -> Output;
    fn fails(&mut self) -> Output;
}

pub struct Output {
    stdout: String,
    stderr: String,
}

impl RunExt for Command {
    fn passes(&mut self) -> Output {
        let out = self.output().expect("command should run");
        let output = Output::from(out.clone());
        assert!(out.status.success(), "expected success, got {}\nstderr:\n{}", out.status, output.stderr);
        output
    }

    fn fails(&mut self) -> Output {
        let out = self.output().expect("command should run");
        let output = Output::from(out.clone());
        assert!(!out.status.success(), "expected failure\nstdout:\n{}", output.stdout);
        output
    }
}

impl From<std::process::Output> for Output {
    fn from(out: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        }
    }
}

impl Output {
    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout.contains(needle), "stdout missing {needle:?}:\n{}", self.stdout);
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr.contains(needle), "stderr missing {needle:?}:\n{}", self.stderr);
        self
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }
}
