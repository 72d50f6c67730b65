// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawned OS processes and their process groups.

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {name}: {source}")]
    Spawn { name: String, source: std::io::Error },

    #[error("wait failed for {name}: {source}")]
    Wait { name: String, source: std::io::Error },

    #[error("{name} was already waited on")]
    AlreadyWaited { name: String },

    #[error("failed to signal process group {pgid}: {source}")]
    Signal { pgid: u32, source: Errno },
}

/// Shell command with piped output in a new process group.
pub fn shell_command(shell: &str, script: &str) -> Command {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    cmd
}

/// Send `signal` to every process in the group led by `pid`.
pub fn signal_group(pid: u32, signal: Signal) -> Result<(), ProcessError> {
    let raw = i32::try_from(pid)
        .map_err(|_| ProcessError::Signal { pgid: pid, source: Errno::EINVAL })?;
    match killpg(Pid::from_raw(raw), signal) {
        // Group already gone
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(ProcessError::Signal { pgid: pid, source }),
    }
}

/// One spawned process whose exit may be awaited exactly once.
///
/// A second `wait` is a supervision bug: it is logged at error level and
/// returned as [`ProcessError::AlreadyWaited`] instead of blocking.
pub struct MonitoredProcess {
    name: String,
    pid: Option<u32>,
    child: Mutex<Option<Child>>,
}

impl MonitoredProcess {
    pub fn new(name: impl Into<String>, child: Child) -> Self {
        let pid = child.id();
        Self { name: name.into(), pid, child: Mutex::new(Some(child)) }
    }

    pub fn spawn(name: impl Into<String>, command: &mut Command) -> Result<Self, ProcessError> {
        let name = name.into();
        match command.spawn() {
            Ok(child) => Ok(Self::new(name, child)),
            Err(source) => Err(ProcessError::Spawn { name, source }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pid at spawn time, which is also the process group id.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the child's piped stdout/stderr, if still attached.
    pub fn take_output(
        &self,
    ) -> (Option<tokio::process::ChildStdout>, Option<tokio::process::ChildStderr>) {
        match self.child.lock().as_mut() {
            Some(child) => (child.stdout.take(), child.stderr.take()),
            None => (None, None),
        }
    }

    pub async fn wait(&self) -> Result<ExitStatus, ProcessError> {
        let taken = self.child.lock().take();
        let Some(mut child) = taken else {
            tracing::error!(code = "JI-S301", name = %self.name, pid = ?self.pid, "process waited twice");
            return Err(ProcessError::AlreadyWaited { name: self.name.clone() });
        };
        child.wait().await.map_err(|source| ProcessError::Wait { name: self.name.clone(), source })
    }

    /// Signal the process group. No-op once the pid is unknown.
    pub fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        match self.pid {
            Some(pid) => signal_group(pid, signal),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
