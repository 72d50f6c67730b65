// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process topology supervisor.
//!
//! Owns the config watch and two children: the job child and the exec
//! child. Each generation runs until one of three things happens:
//!
//! - shutdown: stop both children and return
//! - config change: stop both children, pause twice, re-arm, next generation
//! - a child exits on its own: stop the other one, wait, next generation

use crate::error::AgentError;
use crate::launcher::{ChildLauncher, ManagedChild};
use crate::role::Role;
use crate::update::PendingSwap;
use crate::watch::ConfigWatch;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct TopologyTimings {
    /// Each of the two pauses after stopping children for a reload.
    pub reload_pause: Duration,
    /// Delay before restarting after a child exited unexpectedly.
    pub restart_delay: Duration,
    /// How long a stopping child gets before SIGKILL.
    pub stop_grace: Duration,
}

impl Default for TopologyTimings {
    fn default() -> Self {
        Self {
            reload_pause: Duration::from_secs(3),
            restart_delay: Duration::from_secs(2),
            stop_grace: Duration::from_secs(10),
        }
    }
}

/// Why a generation ended.
#[derive(Debug)]
enum Cause {
    Shutdown,
    Reload,
    ChildExited(Role),
    WatchFailed(AgentError),
}

/// How the supervisor finished.
#[derive(Debug, Default)]
pub struct TopologyExit {
    pub generations: u64,
    /// Swap requested by the last generation's plan, if any.
    pub swap: Option<PendingSwap>,
}

pub struct Topology<L, W> {
    launcher: L,
    watch: W,
    timings: TopologyTimings,
}

impl<L: ChildLauncher, W: ConfigWatch> Topology<L, W> {
    pub fn new(launcher: L, watch: W, timings: TopologyTimings) -> Self {
        Self { launcher, watch, timings }
    }

    /// Run generations until `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<TopologyExit, AgentError> {
        let mut exit = TopologyExit::default();
        loop {
            if shutdown.is_cancelled() {
                return Ok(exit);
            }
            // Preparing can block on a config server outage or an update download.
            let plan = tokio::select! {
                _ = shutdown.cancelled() => return Ok(exit),
                plan = self.launcher.prepare() => plan?,
            };
            exit.swap = plan.swap.clone();
            exit.generations += 1;
            let generation = exit.generations;

            let job = self.launcher.launch(Role::JobChild, &plan)?;
            let exec = match self.launcher.launch(Role::ExecChild, &plan) {
                Ok(exec) => exec,
                Err(e) => {
                    stop_child(&job, self.timings.stop_grace).await;
                    return Err(e);
                }
            };
            tracing::info!(generation, job_pid = ?job.pid(), exec_pid = ?exec.pid(), "children running");

            let cause = tokio::select! {
                _ = shutdown.cancelled() => Cause::Shutdown,
                changed = self.watch.changed() => match changed {
                    Ok(()) => Cause::Reload,
                    Err(e) => Cause::WatchFailed(e),
                },
                role = first_exit(&job, &exec) => Cause::ChildExited(role),
            };

            tracing::info!(generation, ?cause, "stopping children");
            self.stop_children(&job, &exec).await;

            match cause {
                Cause::Shutdown => return Ok(exit),
                Cause::WatchFailed(e) => return Err(e),
                Cause::Reload => {
                    tracing::info!(generation, "config changed, restarting children");
                    if !pause(&shutdown, self.timings.reload_pause).await
                        || !pause(&shutdown, self.timings.reload_pause).await
                    {
                        return Ok(exit);
                    }
                    self.watch.rearm();
                }
                Cause::ChildExited(role) => {
                    tracing::warn!(code = "JI-T101", generation, %role, "child exited unexpectedly, restarting");
                    if !pause(&shutdown, self.timings.restart_delay).await {
                        return Ok(exit);
                    }
                }
            }
        }
    }

    /// SIGTERM both groups, wait for the exec child to exit, then the job
    /// child. Anything still alive after the grace period is killed.
    async fn stop_children(&self, job: &ManagedChild, exec: &ManagedChild) {
        let grace = self.timings.stop_grace;
        tokio::join!(stop_child(exec, grace), stop_child(job, grace));
    }
}

async fn stop_child(child: &ManagedChild, grace: Duration) {
    child.terminate();
    if child.wait_exit(grace).await {
        return;
    }
    tracing::warn!(code = "JI-T102", role = %child.role(), pid = ?child.pid(), ?grace, "child ignored SIGTERM, killing");
    child.kill();
    if !child.wait_exit(grace).await {
        tracing::error!(code = "JI-T103", role = %child.role(), pid = ?child.pid(), "child did not exit after SIGKILL");
    }
}

async fn first_exit(job: &ManagedChild, exec: &ManagedChild) -> Role {
    tokio::select! {
        _ = job.exited() => job.role(),
        _ = exec.exited() => exec.role(),
    }
}

/// Sleep unless shutdown comes first. False means shutdown.
async fn pause(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;
