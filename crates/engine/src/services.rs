// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service Supervisor: keeps configured exec commands alive.
//!
//! Two separate budgets apply per command:
//! - startup: launch failures are retried `start_attempts` times; running
//!   out is a hard failure for that command only
//! - runtime: crashes after a successful start are restarted up to the
//!   exec's `attempt` limit; running out shuts the agent down
//!
//! A successful exit stops supervision, and also shuts the agent down when
//! `cascade_exit` is set.

use crate::context::AgentContext;
use crate::process::{shell_command, MonitoredProcess, ProcessError};
use crate::shutdown::ShutdownNotice;
use ji_core::ExecConfig;
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Env var carrying the agent identity into every service.
pub const IDENTITY_ENV: &str = "JOB_ITEM_IDENTITY_ID";

/// Env var carrying the project uuid into every service.
pub const APP_ID_ENV: &str = "JOB_ITEM_APP_ID";

/// Time a service gets to exit after SIGTERM before SIGKILL.
const STOP_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceTimings {
    pub start_attempts: u32,
    pub start_retry_delay: Duration,
    pub restart_delay: Duration,
}

impl Default for ServiceTimings {
    fn default() -> Self {
        Self {
            start_attempts: 5,
            start_retry_delay: Duration::from_secs(2),
            restart_delay: Duration::from_secs(2),
        }
    }
}

/// How supervision of one command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Supervisor stopped while the command ran
    Stopped,
    /// Clean exit without cascade
    Completed,
    /// Clean exit with cascade; agent shutdown requested
    CascadeExit,
    /// Runtime restarts used up; agent shutdown requested
    Exhausted,
    /// Could not be launched within the startup budget
    StartFailed,
}

ji_core::simple_display! {
    ServiceOutcome {
        Stopped => "stopped",
        Completed => "completed",
        CascadeExit => "cascade_exit",
        Exhausted => "exhausted",
        StartFailed => "start_failed",
    }
}

struct SupervisorInner {
    ctx: AgentContext,
    notice: ShutdownNotice,
    timings: ServiceTimings,
    tracker: TaskTracker,
    stop: CancellationToken,
    pids: Mutex<HashMap<String, u32>>,
}

#[derive(Clone)]
pub struct ServiceSupervisor {
    inner: Arc<SupervisorInner>,
}

impl ServiceSupervisor {
    pub fn new(ctx: AgentContext, notice: ShutdownNotice, timings: ServiceTimings) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                ctx,
                notice,
                timings,
                tracker: TaskTracker::new(),
                stop: CancellationToken::new(),
                pids: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Supervise every configured exec on its own task. Returns the count.
    pub fn start(&self) -> usize {
        let execs = self.inner.ctx.config.execs.clone();
        for exec in &execs {
            let supervisor = self.clone();
            let exec = exec.clone();
            self.inner.tracker.spawn(async move {
                supervisor.supervise(exec).await;
            });
        }
        tracing::info!(count = execs.len(), "services started");
        execs.len()
    }

    /// Current pid of a running service.
    pub fn pid(&self, name: &str) -> Option<u32> {
        self.inner.pids.lock().get(name).copied()
    }

    /// Terminate every service process group and wait for supervision to end.
    pub async fn stop(&self) {
        self.inner.stop.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        tracing::info!("services stopped");
    }

    pub async fn supervise(&self, exec: ExecConfig) -> ServiceOutcome {
        let outcome = self.supervise_inner(&exec).await;
        self.inner.pids.lock().remove(&exec.name);
        tracing::info!(service = %exec.name, %outcome, "service supervision ended");
        outcome
    }

    async fn supervise_inner(&self, exec: &ExecConfig) -> ServiceOutcome {
        let limit = exec.restart_limit();
        let mut restarts = 0;
        let mut process = match self.start_with_retry(exec).await {
            Ok(process) => process,
            Err(outcome) => return outcome,
        };

        loop {
            if let Some(pid) = process.pid() {
                self.inner.pids.lock().insert(exec.name.clone(), pid);
            }
            let Some(exit) = self.wait_or_stop(&process).await else {
                return ServiceOutcome::Stopped;
            };
            self.inner.pids.lock().remove(&exec.name);

            match exit {
                Ok(status) if status.success() => {
                    if exec.cascade_exit {
                        self.inner.notice.publish(&format!("{} exited", exec.name)).await;
                        return ServiceOutcome::CascadeExit;
                    }
                    return ServiceOutcome::Completed;
                }
                exit => {
                    let code = exit.as_ref().ok().and_then(ExitStatus::code);
                    if restarts >= limit {
                        tracing::error!(
                            code = "JI-S103",
                            service = %exec.name,
                            exit_code = ?code,
                            limit,
                            "service restart limit reached"
                        );
                        self.inner.notice.publish(&format!("{} restart limit reached", exec.name)).await;
                        return ServiceOutcome::Exhausted;
                    }
                    restarts += 1;
                    tracing::warn!(
                        code = "JI-S102",
                        service = %exec.name,
                        exit_code = ?code,
                        restart = restarts,
                        limit,
                        "service exited, restarting"
                    );
                }
            }

            if !self.pause(self.inner.timings.restart_delay).await {
                return ServiceOutcome::Stopped;
            }
            process = match self.start_with_retry(exec).await {
                Ok(process) => process,
                Err(outcome) => return outcome,
            };
        }
    }

    async fn start_with_retry(&self, exec: &ExecConfig) -> Result<MonitoredProcess, ServiceOutcome> {
        let attempts = self.inner.timings.start_attempts.max(1);
        for attempt in 1..=attempts {
            if self.inner.stop.is_cancelled() {
                return Err(ServiceOutcome::Stopped);
            }
            match self.launch(exec) {
                Ok(process) => {
                    tracing::info!(service = %exec.name, pid = ?process.pid(), attempt, "service started");
                    return Ok(process);
                }
                Err(e) => {
                    tracing::warn!(code = "JI-S101", service = %exec.name, attempt, error = %e, "service launch failed");
                }
            }
            if attempt < attempts && !self.pause(self.inner.timings.start_retry_delay).await {
                return Err(ServiceOutcome::Stopped);
            }
        }
        tracing::error!(code = "JI-S104", service = %exec.name, attempts, "service could not be started");
        Err(ServiceOutcome::StartFailed)
    }

    fn launch(&self, exec: &ExecConfig) -> Result<MonitoredProcess, ProcessError> {
        let ctx = &self.inner.ctx;
        let mut cmd = shell_command("sh", &exec.cmd);
        cmd.envs(&exec.env).env(IDENTITY_ENV, ctx.identity.as_str()).env(APP_ID_ENV, ctx.group());
        if let Some(dir) = exec.resolved_working_dir(&ctx.base_dir) {
            cmd.current_dir(dir);
        }
        let process = MonitoredProcess::spawn(exec.name.as_str(), &mut cmd)?;
        let (stdout, stderr) = process.take_output();
        if let Some(stdout) = stdout {
            tokio::spawn(tag_output(exec.name.clone(), "stdout", stdout));
        }
        if let Some(stderr) = stderr {
            tokio::spawn(tag_output(exec.name.clone(), "stderr", stderr));
        }
        Ok(process)
    }

    /// Wait for exit, or stop the process group if supervision is stopped.
    async fn wait_or_stop(&self, process: &MonitoredProcess) -> Option<Result<ExitStatus, ProcessError>> {
        let wait = process.wait();
        tokio::pin!(wait);
        tokio::select! {
            exit = &mut wait => Some(exit),
            _ = self.inner.stop.cancelled() => {
                if let Err(e) = process.signal(Signal::SIGTERM) {
                    tracing::warn!(code = "JI-S105", service = %process.name(), error = %e, "service stop signal failed");
                }
                if tokio::time::timeout(STOP_GRACE, &mut wait).await.is_err() {
                    tracing::warn!(code = "JI-S106", service = %process.name(), "service ignored SIGTERM, killing");
                    if let Err(e) = process.signal(Signal::SIGKILL) {
                        tracing::warn!(code = "JI-S107", service = %process.name(), error = %e, "service kill failed");
                    }
                    let _ = (&mut wait).await;
                }
                None
            }
        }
    }

    /// Sleep unless stopped first. Returns false when stopped.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.inner.stop.cancelled() => false,
        }
    }
}

/// Re-log each output line as `[name] >> line`.
async fn tag_output(name: String, stream: &'static str, reader: impl AsyncRead + Unpin) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::info!(service = %name, stream, "[{name}] >> {line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(service = %name, stream, error = %e, "service output closed");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
