// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup config specs
//!
//! Configuration errors are fatal for every role: the process exits
//! non-zero with the reason on stderr instead of retrying.

use crate::prelude::*;

const NO_BROKER: &str = "\
identity_id: agent-1
credential: { project_id: proj, secret_key: s }
jobs: [{ name: build, event: build, cmd: 'echo {{task_id}}' }]
";

const REDIS_WITHOUT_DB: &str = "\
identity_id: agent-1
credential: { project_id: proj, secret_key: s }
broker_connection: { type: redis, host: 127.0.0.1, port: 6379 }
";

#[test]
fn missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .arg("--config")
        .arg(dir.path().join("missing").join("config.yaml"))
        .fails()
        .stderr_has("supervisor failed");
}

#[test]
fn supervisor_rejects_config_without_broker() {
    let agent = Agent::with_config(NO_BROKER);
    agent.job_item(&[]).fails().stderr_has("broker_connection is required");
}

#[test]
fn job_child_rejects_config_without_broker() {
    let agent = Agent::with_config(NO_BROKER);
    agent.job_item(&["job-child"]).fails().stderr_has("job-child failed");
}

#[test]
fn exec_child_rejects_malformed_yaml() {
    let agent = Agent::with_config("jobs: [unterminated\n");
    agent.job_item(&["exec-child"]).fails().stderr_has("malformed config");
}

#[test]
fn redis_requires_password_and_db() {
    let agent = Agent::with_config(REDIS_WITHOUT_DB);
    agent.job_item(&["job-child"]).fails().stderr_has("job-child failed");
}

#[test]
fn config_path_from_environment() {
    let agent = Agent::with_config(NO_BROKER);
    cli()
        .arg("exec-child")
        .env("CONFIG_PATH", agent.config_path())
        .current_dir(agent.path())
        .fails()
        .stderr_has("broker_connection is required");
}
