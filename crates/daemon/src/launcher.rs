// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launching the supervisor's child processes.

use crate::env;
use crate::error::AgentError;
use crate::resolve;
use crate::role::Role;
use crate::update::{self, PendingSwap};
use async_trait::async_trait;
use ji_core::IdentityId;
use ji_engine::signal_group;
use nix::sys::signal::Signal;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;

/// Everything one generation of children is started with.
#[derive(Debug, Clone)]
pub struct ChildPlan {
    /// Binary the children run; a downloaded update when one is pending.
    pub program: PathBuf,
    /// Resolved config as JSON, handed down so children do not re-fetch.
    pub config_data: String,
    pub identity: IdentityId,
    /// Executable swap to run when the supervisor finally exits.
    pub swap: Option<PendingSwap>,
}

#[async_trait]
pub trait ChildLauncher: Send + Sync {
    /// Resolve config and version state for the next generation.
    async fn prepare(&self) -> Result<ChildPlan, AgentError>;

    fn launch(&self, role: Role, plan: &ChildPlan) -> Result<ManagedChild, AgentError>;
}

/// A child process leading its own process group.
///
/// A background task owns the OS handle and records the exit status, so
/// any number of clones can wait on or signal the child.
#[derive(Debug, Clone)]
pub struct ManagedChild {
    role: Role,
    pid: Option<u32>,
    exit: watch::Receiver<Option<ExitStatus>>,
}

impl ManagedChild {
    /// Spawn `command` in a new process group.
    pub fn spawn(role: Role, mut command: Command) -> Result<Self, AgentError> {
        command.process_group(0).kill_on_drop(true);
        let mut child = command.spawn().map_err(|source| AgentError::Spawn { role, source })?;
        let pid = child.id();
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let _ = tx.send(Some(status));
                }
                Err(e) => {
                    tracing::error!(code = "JI-T301", %role, error = %e, "child wait failed");
                    // Nothing more can be learned about this child; report it gone
                    let _ = tx.send(Some(std::os::unix::process::ExitStatusExt::from_raw(-1)));
                }
            }
        });
        tracing::info!(%role, pid = pid.unwrap_or_default(), "child started");
        Ok(Self { role, pid, exit: rx })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.exit.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_status().is_some()
    }

    /// Wait until the child exits.
    pub async fn exited(&self) -> Option<ExitStatus> {
        let mut rx = self.exit.clone();
        let status = match rx.wait_for(Option::is_some).await {
            Ok(status) => *status,
            // Sender gone without a status: the wait task was dropped
            Err(_) => None,
        };
        status
    }

    /// Wait up to `timeout`; true when the child exited in time.
    pub async fn wait_exit(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.exited()).await.is_ok()
    }

    /// SIGTERM to the whole group.
    pub fn terminate(&self) {
        self.signal(Signal::SIGTERM);
    }

    /// SIGKILL to the whole group.
    pub fn kill(&self) {
        self.signal(Signal::SIGKILL);
    }

    fn signal(&self, signal: Signal) {
        let Some(pid) = self.pid else { return };
        if self.has_exited() {
            return;
        }
        if let Err(e) = signal_group(pid, signal) {
            tracing::warn!(code = "JI-T302", role = %self.role, pid, ?signal, error = %e, "failed to signal child group");
        }
    }
}

/// Re-executes this binary with a role subcommand.
pub struct ProcessLauncher {
    config_path: PathBuf,
    current_exe: PathBuf,
}

impl ProcessLauncher {
    pub fn new(config_path: impl Into<PathBuf>, current_exe: impl Into<PathBuf>) -> Self {
        Self { config_path: config_path.into(), current_exe: current_exe.into() }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Command line and environment for one child.
    pub fn command(&self, role: Role, plan: &ChildPlan) -> Command {
        let mut cmd = Command::new(&plan.program);
        cmd.arg(role.subcommand())
            .arg("--config")
            .arg(&self.config_path)
            .env(env::CONFIG_DATA, &plan.config_data)
            .env(env::IDENTITY_ID, plan.identity.as_str())
            .env(env::SUPERVISOR_PID, std::process::id().to_string())
            .stdin(Stdio::null());
        cmd
    }
}

#[async_trait]
impl ChildLauncher for ProcessLauncher {
    async fn prepare(&self) -> Result<ChildPlan, AgentError> {
        let resolved = resolve::resolve(&self.config_path).await?;
        let swap = match update::ensure_latest(&resolved.config, &self.current_exe).await {
            Ok(swap) => swap,
            Err(e) => {
                tracing::warn!(code = "JI-U101", error = %e, "update failed, running current version");
                None
            }
        };
        let program = swap.as_ref().map_or_else(|| self.current_exe.clone(), |s| s.replacement.clone());
        Ok(ChildPlan {
            program,
            config_data: resolved.config.to_json()?,
            identity: resolved.identity,
            swap,
        })
    }

    fn launch(&self, role: Role, plan: &ChildPlan) -> Result<ManagedChild, AgentError> {
        ManagedChild::spawn(role, self.command(role, plan))
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
