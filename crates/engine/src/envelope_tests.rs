// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn decodes_data_message() {
    let msg = JobMessage::decode(r#"{"task_id":"T1","data":{"foo":"bar","n":3}}"#).unwrap();
    assert_eq!(msg.task_id, "T1");
    assert_eq!(msg.action, None);
    assert_eq!(msg.cancellation(), None);

    let vars = msg.vars();
    assert_eq!(vars["foo"], "bar");
    assert_eq!(vars["n"], "3");
    assert_eq!(vars["task_id"], "T1");
}

#[yare::parameterized(
    timeout   = { "timeout",   Some(JobStatus::Timeout) },
    terminate = { "terminate", Some(JobStatus::Terminate) },
    finish    = { "finish",    None },
    garbage   = { "restart",   None },
)]
fn cancellation_action(action: &str, expected: Option<JobStatus>) {
    let payload = json!({ "task_id": "T1", "action": action }).to_string();
    assert_eq!(JobMessage::decode(&payload).unwrap().cancellation(), expected);
}

#[test]
fn missing_data_defaults_to_null() {
    let msg = JobMessage::decode(r#"{"task_id":"T2"}"#).unwrap();
    assert_eq!(msg.data, Value::Null);
    assert_eq!(msg.vars().len(), 1);
}

#[test]
fn array_data_only_exposes_task_id() {
    let msg = JobMessage::new(TaskId::new("T3"), json!(["a", "b"]));
    let vars = msg.vars();
    assert_eq!(vars.len(), 1);
    assert_eq!(vars["task_id"], "T3");
}

#[test]
fn task_id_in_data_is_overridden() {
    let msg = JobMessage::new(TaskId::new("real"), json!({ "task_id": "spoofed", "x": null }));
    let vars = msg.vars();
    assert_eq!(vars["task_id"], "real");
    assert_eq!(vars["x"], "");
}

#[test]
fn encode_omits_absent_action() {
    let msg = JobMessage::new(TaskId::new("T4"), json!({ "a": 1 }));
    let encoded = msg.encode();
    assert!(!encoded.contains("action"));
    assert_eq!(JobMessage::decode(&encoded).unwrap(), msg);
}

#[test]
fn rejects_missing_task_id() {
    assert!(JobMessage::decode(r#"{"data":{}}"#).is_err());
    assert!(JobMessage::decode("not json").is_err());
}
