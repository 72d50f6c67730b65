// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One job invocation, from envelope to `_finish`.
//!
//! ```text
//! received -> spawned -> running -> finish | error
//!                           |-> timeout | terminate   (bus: {task_id}_timeout / _terminate)
//! ```
//!
//! Output readers are joined before `_finish` is published, so every
//! `_process`/`_failed` publish is issued first. The settle delay then gives
//! the broker time to deliver them.

use crate::envelope::JobMessage;
use crate::error::JobError;
use crate::process::{shell_command, MonitoredProcess};
use crate::template;
use ji_broker::{handler, BrokerConnection, Subscription};
use ji_core::{topic, BusSubscription, EventBus, JobConfig, JobStatus, TaskId};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Largest output chunk published per message.
pub const CHUNK_SIZE: usize = 1024;

/// Minimum time given to output readers after the process exits.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Runs job invocations against one broker connection.
#[derive(Clone)]
pub struct JobRunner {
    conn: Arc<dyn BrokerConnection>,
    bus: EventBus,
    group: String,
    task_dir: PathBuf,
    settle_delay: Duration,
    shutdown: CancellationToken,
}

impl JobRunner {
    pub fn new(
        conn: Arc<dyn BrokerConnection>,
        bus: EventBus,
        group: impl Into<String>,
        task_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            conn,
            bus,
            group: group.into(),
            task_dir: task_dir.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Cancelling `token` terminates every invocation of this runner.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Run one invocation to completion and return the published status.
    pub async fn run(&self, job: &JobConfig, message: JobMessage) -> JobStatus {
        let task_id = message.task_id.clone();
        tracing::info!(task_id = %task_id, job = %job.name, event = %job.event, "job received");
        self.persist(&message);

        let vars = message.vars();
        for name in template::placeholders(&job.cmd) {
            if !vars.contains_key(name) {
                tracing::debug!(task_id = %task_id, placeholder = name, "placeholder has no value");
            }
        }
        let command = match template::render(&job.cmd, &vars) {
            Ok(command) => command,
            Err(e) => return self.abandon(&task_id, e.into()).await,
        };

        // Armed before spawn so an early cancellation is not missed
        let cancel = CancelSignal::arm(&self.bus, &task_id, &self.shutdown);
        let worker = self.watch_worker_topic(&task_id).await;

        let outcome = self.execute(&task_id, &command, &cancel).await;
        cancel.disarm(&self.bus);
        if let Some(worker) = worker {
            worker.cancel();
        }

        let status = match outcome {
            Ok(status) => status,
            Err(e) => return self.abandon(&task_id, e).await,
        };
        tokio::time::sleep(self.settle_delay).await;
        self.conn.publish(&topic::task_finish(&task_id), &status.to_string()).await;
        tracing::info!(task_id = %task_id, %status, "job finished");
        status
    }

    async fn execute(
        &self,
        task_id: &TaskId,
        command: &str,
        cancel: &CancelSignal,
    ) -> Result<JobStatus, JobError> {
        let process = MonitoredProcess::spawn(task_id.as_str(), &mut shell_command("bash", command))?;
        tracing::info!(task_id = %task_id, pid = ?process.pid(), "job spawned");

        let saw_stderr = Arc::new(AtomicBool::new(false));
        let (stdout, stderr) = process.take_output();
        let mut readers = Vec::new();
        if let Some(stdout) = stdout {
            readers.push(self.forward(stdout, topic::task_process(task_id), None));
        }
        if let Some(stderr) = stderr {
            readers.push(self.forward(stderr, topic::task_failed(task_id), Some(Arc::clone(&saw_stderr))));
        }

        let wait = process.wait();
        tokio::pin!(wait);
        let exit = tokio::select! {
            exit = &mut wait => exit,
            _ = cancel.cancelled() => {
                tracing::info!(task_id = %task_id, reason = ?cancel.reason(), "killing job");
                if let Err(e) = process.signal(Signal::SIGKILL) {
                    tracing::warn!(code = "JI-J102", task_id = %task_id, error = %e, "job kill failed");
                }
                (&mut wait).await
            }
        };

        let deadline = Instant::now() + self.settle_delay.max(READER_GRACE);
        for mut reader in readers {
            if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
                tracing::warn!(code = "JI-J104", task_id = %task_id, "output still open after exit, detaching reader");
                reader.abort();
            }
        }

        let exit = exit?;
        if let Some(reason) = cancel.reason() {
            return Ok(reason);
        }
        if saw_stderr.load(Ordering::SeqCst) || !exit.success() {
            tracing::info!(task_id = %task_id, code = ?exit.code(), "job failed");
            return Ok(JobStatus::Error);
        }
        Ok(JobStatus::Finish)
    }

    fn forward(
        &self,
        reader: impl AsyncRead + Unpin + Send + 'static,
        topic: String,
        seen: Option<Arc<AtomicBool>>,
    ) -> JoinHandle<()> {
        tokio::spawn(forward_output(reader, Arc::clone(&self.conn), topic, seen))
    }

    /// Mirror cancellation envelopes on `{task_id}_worker` onto the bus.
    async fn watch_worker_topic(&self, task_id: &TaskId) -> Option<Subscription> {
        let bus = self.bus.clone();
        let id = task_id.clone();
        let on_message = handler(move |payload| {
            match JobMessage::decode(&payload).ok().and_then(|m| m.cancellation()) {
                Some(status) => {
                    bus.publish(&topic::task_status(&id, status), &payload);
                }
                None => tracing::debug!(task_id = %id, "ignoring worker message without cancellation"),
            }
        });
        match self.conn.subscribe_grouped(&topic::task_worker(task_id), &self.group, on_message).await {
            Ok(sub) => Some(sub),
            Err(e) => {
                tracing::warn!(code = "JI-J105", task_id = %task_id, error = %e, "worker topic unavailable");
                None
            }
        }
    }

    /// Write the job data next to other task files. Failure is not fatal.
    fn persist(&self, message: &JobMessage) {
        let path = task_file(&self.task_dir, &message.task_id);
        let result = serde_json::to_vec_pretty(&message.data)
            .map_err(std::io::Error::other)
            .and_then(|body| {
                std::fs::create_dir_all(&self.task_dir)?;
                std::fs::write(&path, body)
            });
        if let Err(e) = result {
            tracing::warn!(code = "JI-J101", path = %path.display(), error = %e, "failed to persist job data");
        }
    }

    async fn abandon(&self, task_id: &TaskId, err: JobError) -> JobStatus {
        tracing::error!(code = "JI-J110", task_id = %task_id, error = %err, "job abandoned");
        self.conn.publish(&topic::task_failed(task_id), &err.to_string()).await;
        self.conn.publish(&topic::task_finish(task_id), &JobStatus::Error.to_string()).await;
        JobStatus::Error
    }
}

/// `{task_dir}/{task_id}.json`, with path-unsafe characters replaced.
pub fn task_file(task_dir: &Path, task_id: &TaskId) -> PathBuf {
    let stem: String = task_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    task_dir.join(format!("{stem}.json"))
}

async fn forward_output(
    mut reader: impl AsyncRead + Unpin,
    conn: Arc<dyn BrokerConnection>,
    topic: String,
    seen: Option<Arc<AtomicBool>>,
) {
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Some(seen) = &seen {
                    seen.store(true, Ordering::SeqCst);
                }
                conn.publish(&topic, &String::from_utf8_lossy(&buf[..n])).await;
            }
            Err(e) => {
                tracing::warn!(code = "JI-J103", topic, error = %e, "output read failed");
                break;
            }
        }
    }
}

/// One-shot bus listeners for `{task_id}_timeout` and `{task_id}_terminate`.
///
/// The first cancellation wins and sticks. A runner shutdown without a bus
/// event counts as `terminate`.
struct CancelSignal {
    token: CancellationToken,
    reason: Arc<Mutex<Option<JobStatus>>>,
    subs: Vec<BusSubscription>,
}

impl CancelSignal {
    fn arm(bus: &EventBus, task_id: &TaskId, shutdown: &CancellationToken) -> Self {
        let token = shutdown.child_token();
        let reason = Arc::new(Mutex::new(None));
        let subs = [JobStatus::Timeout, JobStatus::Terminate]
            .into_iter()
            .map(|status| {
                let token = token.clone();
                let reason = Arc::clone(&reason);
                bus.subscribe_once(topic::task_status(task_id, status), move |_| {
                    reason.lock().get_or_insert(status);
                    token.cancel();
                })
            })
            .collect();
        Self { token, reason, subs }
    }

    async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    fn reason(&self) -> Option<JobStatus> {
        let reason = *self.reason.lock();
        reason.or_else(|| self.token.is_cancelled().then_some(JobStatus::Terminate))
    }

    /// Drop listeners that never fired.
    fn disarm(&self, bus: &EventBus) {
        for sub in &self.subs {
            bus.unsubscribe(sub);
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
