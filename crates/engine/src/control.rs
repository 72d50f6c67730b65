// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publish helpers behind the local control surface.

use crate::envelope::JobMessage;
use ji_broker::BrokerConnection;
use ji_core::{topic, JobStatus, TaskId};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Largest notification message relayed, in bytes.
pub const NOTIFICATION_LIMIT: usize = 100 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("notification is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

#[derive(Debug, Serialize)]
struct Notification<'a> {
    msg: &'a str,
    created_at: String,
    status: JobStatus,
}

/// Publish a new job request on `{app_id}.{event}` and return its task id.
pub async fn create_job(
    conn: &dyn BrokerConnection,
    app_id: &str,
    event: &str,
    form_body: Value,
) -> TaskId {
    let task_id = TaskId::generate();
    let topic = topic::job_event(app_id, event);
    conn.publish(&topic, &JobMessage::new(task_id.clone(), form_body).encode()).await;
    tracing::info!(%topic, task_id = %task_id, "job created");
    task_id
}

/// Relay a notification onto `{task_id}.notif_add`.
pub async fn add_notification(
    conn: &dyn BrokerConnection,
    task_id: &TaskId,
    msg: &str,
) -> Result<(), ControlError> {
    if msg.len() > NOTIFICATION_LIMIT {
        tracing::warn!(code = "JI-J301", task_id = %task_id, size = msg.len(), "notification rejected");
        return Err(ControlError::TooLarge { size: msg.len(), limit: NOTIFICATION_LIMIT });
    }
    let notification = Notification {
        msg,
        created_at: chrono::Utc::now().to_rfc3339(),
        status: JobStatus::Process,
    };
    let payload = serde_json::to_string(&notification).unwrap_or_default();
    conn.publish(&topic::notification(task_id), &payload).await;
    Ok(())
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
