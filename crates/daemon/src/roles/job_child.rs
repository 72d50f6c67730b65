// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::agent_context;
use crate::env;
use crate::error::AgentError;
use crate::resolve::inherit_or_resolve;
use crate::signals::install_shutdown_handler;
use crate::telemetry::{Telemetry, TelemetryTimings};
use ji_engine::{JobDispatcher, ShutdownListener};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{getppid, Pid};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub(super) async fn run(config_path: &Path) -> Result<(), AgentError> {
    let shutdown = install_shutdown_handler()?;
    let resolved = inherit_or_resolve(config_path).await?;
    let ctx = agent_context(resolved).await?;

    let task_dir = env::task_dir().unwrap_or_else(|| ctx.base_dir.clone());
    let dispatcher = JobDispatcher::new(ctx.clone(), task_dir, env::settle_delay());
    dispatcher.start().await?;

    // The supervisor owns the process tree; ask it to take everything down
    let supervisor = env::supervisor_pid().unwrap_or_else(|| getppid().as_raw());
    let listener = ShutdownListener::start(ctx.clone(), move |reason| {
        tracing::warn!(code = "JI-S204", %reason, supervisor, "agent shutdown requested over broker");
        interrupt(supervisor);
    })
    .await?;

    let telemetry_stop = CancellationToken::new();
    if ctx.config.end_point().is_some() {
        Telemetry::new(ctx.clone(), TelemetryTimings::default()).spawn(telemetry_stop.clone());
    }

    shutdown.cancelled().await;

    telemetry_stop.cancel();
    listener.stop().await;
    let drained = dispatcher.shutdown(env::drain_timeout()).await;
    tracing::info!(drained, "job child stopped");
    Ok(())
}

/// Send SIGINT to `pid`. Failures are logged.
pub fn interrupt(pid: i32) {
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGINT) {
        tracing::error!(code = "JI-S205", pid, error = %e, "failed to interrupt supervisor");
    }
}
