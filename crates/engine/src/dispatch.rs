// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job Dispatch Engine: broker subscriptions for every active job.
//!
//! Each active job is subscribed on `{project_uuid}.{event}` with the project
//! uuid as consumer group. Handlers never block: data messages spawn a
//! tracked task, cancellation-only messages are mirrored onto the bus.
//! A refresh notice for our connection key replaces every subscription.

use crate::context::AgentContext;
use crate::envelope::JobMessage;
use crate::error::JobError;
use crate::job::JobRunner;
use ji_broker::{handler, MessageHandler, Subscription};
use ji_core::{topic, BusSubscription, JobConfig, TaskId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

struct DispatchInner {
    ctx: AgentContext,
    task_dir: PathBuf,
    settle_delay: Duration,
    // Held across subscribe calls so concurrent refreshes serialize
    subscriptions: tokio::sync::Mutex<Vec<Subscription>>,
    refresh: Mutex<Option<BusSubscription>>,
    running: Mutex<HashSet<TaskId>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct JobDispatcher {
    inner: Arc<DispatchInner>,
}

impl JobDispatcher {
    pub fn new(ctx: AgentContext, task_dir: impl Into<PathBuf>, settle_delay: Duration) -> Self {
        Self {
            inner: Arc::new(DispatchInner {
                ctx,
                task_dir: task_dir.into(),
                settle_delay,
                subscriptions: tokio::sync::Mutex::new(Vec::new()),
                refresh: Mutex::new(None),
                running: Mutex::new(HashSet::new()),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Subscribe every active job and follow refresh notices.
    ///
    /// Returns the number of job subscriptions.
    pub async fn start(&self) -> Result<usize, JobError> {
        let (_, unmatched) = self.inner.ctx.config.partition_jobs();
        for job in unmatched {
            tracing::warn!(
                code = "JI-J201",
                job = %job.name,
                event = %job.event,
                "no project job data for event, not subscribing"
            );
        }
        let count = self.resubscribe().await?;
        self.follow_refresh();
        Ok(count)
    }

    /// Replace every job subscription with a fresh one on the current
    /// connection. Safe to call repeatedly: old subscriptions are cancelled
    /// first, so one inbound message still spawns one process.
    pub async fn resubscribe(&self) -> Result<usize, JobError> {
        let inner = &self.inner;
        let mut subs = inner.subscriptions.lock().await;
        for sub in subs.drain(..) {
            sub.cancel();
        }
        if inner.shutdown.is_cancelled() {
            return Ok(0);
        }

        let conn = inner
            .ctx
            .connection()
            .ok_or_else(|| JobError::NoConnection(inner.ctx.connection_key().to_string()))?;
        let group = inner.ctx.group();
        let runner = JobRunner::new(Arc::clone(&conn), inner.ctx.bus.clone(), group, &inner.task_dir)
            .with_settle_delay(inner.settle_delay)
            .with_shutdown(inner.shutdown.clone());

        let (active, _) = inner.ctx.config.partition_jobs();
        for job in active {
            let topic = topic::job_event(group, &job.event);
            let on_message = on_message(Arc::downgrade(inner), runner.clone(), Arc::new(job.clone()));
            let sub = conn.subscribe_grouped(&topic, group, on_message).await?;
            tracing::info!(%topic, job = %job.name, "subscribed job");
            subs.push(sub);
        }
        Ok(subs.len())
    }

    /// Resubscribe whenever our connection reports a reconnect.
    fn follow_refresh(&self) {
        let weak = Arc::downgrade(&self.inner);
        let runtime = tokio::runtime::Handle::current();
        let sub = self.inner.ctx.on_refresh(move || {
            let Some(inner) = weak.upgrade() else { return };
            let dispatcher = JobDispatcher { inner };
            runtime.spawn(async move {
                match dispatcher.resubscribe().await {
                    Ok(count) => tracing::info!(count, "job subscriptions refreshed"),
                    Err(e) => tracing::error!(code = "JI-J205", error = %e, "job resubscribe failed"),
                }
            });
        });
        if let Some(old) = self.inner.refresh.lock().replace(sub) {
            self.inner.ctx.bus.unsubscribe(&old);
        }
    }

    /// Task ids currently running.
    pub fn running(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.inner.running.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop taking jobs, terminate running ones and wait up to `drain` for
    /// their `_finish`. Returns false if the drain timed out.
    pub async fn shutdown(&self, drain: Duration) -> bool {
        let inner = &self.inner;
        inner.shutdown.cancel();
        if let Some(sub) = inner.refresh.lock().take() {
            inner.ctx.bus.unsubscribe(&sub);
        }
        for sub in inner.subscriptions.lock().await.drain(..) {
            sub.cancel();
        }

        let running = self.running();
        tracing::info!(running = running.len(), "draining jobs");
        inner.tracker.close();
        let drained = tokio::time::timeout(drain, inner.tracker.wait()).await.is_ok();
        if !drained {
            tracing::warn!(code = "JI-J206", still_running = ?self.running(), "drain timed out");
        }
        drained
    }
}

fn on_message(inner: Weak<DispatchInner>, runner: JobRunner, job: Arc<JobConfig>) -> MessageHandler {
    handler(move |payload| {
        if let Some(inner) = inner.upgrade() {
            inner.dispatch(&runner, &job, &payload);
        }
    })
}

impl DispatchInner {
    fn dispatch(self: &Arc<Self>, runner: &JobRunner, job: &Arc<JobConfig>, payload: &str) {
        let message = match JobMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(code = "JI-J202", job = %job.name, error = %e, "dropping malformed job message");
                return;
            }
        };

        if let Some(status) = message.cancellation() {
            let delivered =
                self.ctx.bus.publish(&topic::task_status(&message.task_id, status), payload);
            tracing::info!(task_id = %message.task_id, %status, delivered, "cancellation received");
            return;
        }
        if self.shutdown.is_cancelled() {
            tracing::warn!(code = "JI-J204", task_id = %message.task_id, "shutting down, job dropped");
            return;
        }
        if !self.running.lock().insert(message.task_id.clone()) {
            tracing::warn!(code = "JI-J203", task_id = %message.task_id, "task already running, duplicate dropped");
            return;
        }

        let inner = Arc::clone(self);
        let runner = runner.clone();
        let job = Arc::clone(job);
        self.tracker.spawn(async move {
            let task_id = message.task_id.clone();
            runner.run(&job, message).await;
            inner.running.lock().remove(&task_id);
        });
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
