// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn lock_key_scopes_topic_and_group() {
    let key = lock_key("p.build", "p", "{}");
    assert!(key.starts_with("lock:p.build:p:"));
    assert_eq!(key.len(), "lock:p.build:p:".len() + 64);
}

#[yare::parameterized(
    other_topic   = { "p.deploy", "p",  "{}" },
    other_group   = { "p.build",  "q",  "{}" },
    other_payload = { "p.build",  "p",  "{\"task_id\":\"T2\"}" },
)]
fn lock_keys_differ(topic: &str, group: &str, payload: &str) {
    assert_ne!(lock_key("p.build", "p", "{}"), lock_key(topic, group, payload));
}

#[tokio::test]
async fn two_subscribers_in_one_group_handle_once() {
    let shared = MemoryLock::new();
    let first = GroupGate::new(shared.clone(), GROUP_LOCK_TTL);
    let second = GroupGate::new(shared, GROUP_LOCK_TTL);
    let handled = Arc::new(AtomicUsize::new(0));

    let payload = r#"{"task_id":"T1","data":{}}"#;
    let a = first.admit("p.build", "p", payload);
    let b = second.admit("p.build", "p", payload);
    let (a, b) = tokio::join!(a, b);
    for won in [a, b] {
        if won {
            handled.fetch_add(1, Ordering::SeqCst);
        }
    }

    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_groups_each_handle() {
    let shared = MemoryLock::new();
    let gate = GroupGate::new(shared, GROUP_LOCK_TTL);
    assert!(gate.admit("p.build", "team-a", "m").await);
    assert!(gate.admit("p.build", "team-b", "m").await);
}

#[tokio::test]
async fn claim_expires_after_ttl() {
    let gate = GroupGate::new(MemoryLock::new(), Duration::from_millis(10));
    assert!(gate.admit("t", "g", "m").await);
    assert!(!gate.admit("t", "g", "m").await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(gate.admit("t", "g", "m").await);
}

struct BrokenLock;

#[async_trait]
impl GroupLock for BrokenLock {
    async fn try_acquire(&self, _key: &str, _ttl: Duration) -> Result<bool, BrokerError> {
        Err(BrokerError::Command { kind: ji_core::BrokerKind::Store, message: "down".into() })
    }
}

#[tokio::test]
async fn lock_store_failure_drops_the_message() {
    let gate = GroupGate::new(BrokenLock, GROUP_LOCK_TTL);
    assert!(!gate.admit("t", "g", "m").await);
}
