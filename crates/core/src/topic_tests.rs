// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn task_topics_are_bit_exact() {
    let t = TaskId::new("T1");
    assert_eq!(task_process(&t), "T1_process");
    assert_eq!(task_failed(&t), "T1_failed");
    assert_eq!(task_finish(&t), "T1_finish");
    assert_eq!(task_worker(&t), "T1_worker");
    assert_eq!(notification(&t), "T1.notif_add");
}

#[yare::parameterized(
    timeout   = { JobStatus::Timeout,   "T1_timeout" },
    terminate = { JobStatus::Terminate, "T1_terminate" },
)]
fn cancellation_topics(status: JobStatus, expected: &str) {
    assert_eq!(task_status(&TaskId::new("T1"), status), expected);
}

#[test]
fn job_and_shutdown_topics() {
    assert_eq!(job_event("proj-1", "build"), "proj-1.build");
    assert_eq!(shutdown(&IdentityId::new("agent-9")), "agent-9.shutdown");
}
