// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the agent.

use ji_core::{AgentConfig, ConfigError, IdentityId};
use std::path::PathBuf;
use std::time::Duration;

/// Resolved config handed from the supervisor to its children (JSON).
pub const CONFIG_DATA: &str = "JOB_ITEM_CONFIG_DATA";

/// Agent identity, for children and as an override before the identity file.
pub const IDENTITY_ID: &str = ji_engine::IDENTITY_ENV;

/// Pid the job child signals when a shutdown notice arrives.
pub const SUPERVISOR_PID: &str = "JOB_ITEM_SUPERVISOR_PID";

fn millis(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.trim().is_empty())
}

/// Shutdown drain timeout (default 5s, configurable via `JOB_ITEM_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    millis("JOB_ITEM_DRAIN_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Delay before `_finish` is published (`JOB_ITEM_SETTLE_MS`, default 3s).
pub fn settle_delay() -> Duration {
    millis("JOB_ITEM_SETTLE_MS").unwrap_or(ji_engine::DEFAULT_SETTLE_DELAY)
}

/// Each of the two pauses between stopping and restarting children on reload.
pub fn reload_pause() -> Duration {
    millis("JOB_ITEM_RELOAD_PAUSE_MS").unwrap_or(Duration::from_secs(3))
}

/// Directory for daily rolling log files. Stdout only when unset.
pub fn log_dir() -> Option<PathBuf> {
    non_empty("JOB_ITEM_LOG_DIR").map(PathBuf::from)
}

/// Directory for per-task data files. Defaults to the config directory.
pub fn task_dir() -> Option<PathBuf> {
    non_empty("JOB_ITEM_TASK_DIR").map(PathBuf::from)
}

pub fn identity_override() -> Option<IdentityId> {
    non_empty(IDENTITY_ID).map(IdentityId::new)
}

/// Config resolved by the supervisor, when running as a child.
pub fn inherited_config() -> Result<Option<AgentConfig>, ConfigError> {
    match non_empty(CONFIG_DATA) {
        Some(data) => AgentConfig::from_json(&data).map(Some),
        None => Ok(None),
    }
}

pub fn supervisor_pid() -> Option<i32> {
    std::env::var(SUPERVISOR_PID).ok().and_then(|s| s.parse::<i32>().ok()).filter(|pid| *pid > 1)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
