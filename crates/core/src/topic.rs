// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker and event-bus topic names.
//!
//! These strings are matched by the central job manager and must not change.

use crate::id::{IdentityId, TaskId};
use crate::status::JobStatus;

/// Local Event Bus topic announcing that a broker connection reconnected.
pub const REFRESH_NOTICE: &str = "refresh_pubsub";

pub const HOST_INFORMATION: &str = "listen_host_information";
pub const CPU_INFORMATION: &str = "listen_cpu_information";
pub const MEM_INFORMATION: &str = "listen_mem_information";
pub const NET_INFORMATION: &str = "listen_net_information";

/// `{project_uuid}.{event}`: inbound job requests.
pub fn job_event(project_uuid: &str, event: &str) -> String {
    format!("{project_uuid}.{event}")
}

/// `{task_id}_process`: stdout chunks.
pub fn task_process(task_id: &TaskId) -> String {
    format!("{task_id}_process")
}

/// `{task_id}_failed`: stderr chunks and abandon reasons.
pub fn task_failed(task_id: &TaskId) -> String {
    format!("{task_id}_failed")
}

/// `{task_id}_finish`: final status word.
pub fn task_finish(task_id: &TaskId) -> String {
    format!("{task_id}_finish")
}

/// `{task_id}_timeout` / `{task_id}_terminate`, identical on broker and bus.
pub fn task_status(task_id: &TaskId, status: JobStatus) -> String {
    format!("{task_id}_{status}")
}

/// `{task_id}_worker`: per-task control channel carrying cancellation actions.
pub fn task_worker(task_id: &TaskId) -> String {
    format!("{task_id}_worker")
}

/// `{task_id}.notif_add`: notifications relayed from the local control surface.
pub fn notification(task_id: &TaskId) -> String {
    format!("{task_id}.notif_add")
}

/// `{identity_id}.shutdown`: agent-wide shutdown.
pub fn shutdown(identity: &IdentityId) -> String {
    format!("{identity}.shutdown")
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
