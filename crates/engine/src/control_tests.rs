// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ji_broker::MemoryBroker;
use serde_json::json;

#[tokio::test]
async fn create_job_publishes_envelope_with_fresh_task_id() {
    let broker = MemoryBroker::new("default");
    let first = create_job(&broker, "app", "deploy", json!({ "env": "prod" })).await;
    let second = create_job(&broker, "app", "deploy", json!({})).await;
    assert_ne!(first, second);

    let payloads = broker.published_to("app.deploy");
    assert_eq!(payloads.len(), 2);
    let message = JobMessage::decode(&payloads[0]).unwrap();
    assert_eq!(message.task_id, first);
    assert_eq!(message.data, json!({ "env": "prod" }));
    assert_eq!(message.action, None);
}

#[tokio::test]
async fn notification_is_relayed_with_status_and_timestamp() {
    let broker = MemoryBroker::new("default");
    let task = TaskId::new("T1");
    add_notification(&broker, &task, "50% done").await.unwrap();

    let payloads = broker.published_to("T1.notif_add");
    assert_eq!(payloads.len(), 1);
    let body: Value = serde_json::from_str(&payloads[0]).unwrap();
    assert_eq!(body["msg"], "50% done");
    assert_eq!(body["status"], "process");
    assert!(chrono::DateTime::parse_from_rfc3339(body["created_at"].as_str().unwrap()).is_ok());
}

#[yare::parameterized(
    at_limit   = { NOTIFICATION_LIMIT,     true },
    over_limit = { NOTIFICATION_LIMIT + 1, false },
)]
#[test_macro(tokio::test)]
async fn notification_size_limit(size: usize, accepted: bool) {
    let broker = MemoryBroker::new("default");
    let msg = "x".repeat(size);
    let result = add_notification(&broker, &TaskId::new("T2"), &msg).await;

    assert_eq!(result.is_ok(), accepted);
    assert_eq!(broker.published().len(), usize::from(accepted));
    if !accepted {
        assert_eq!(result, Err(ControlError::TooLarge { size, limit: NOTIFICATION_LIMIT }));
    }
}
