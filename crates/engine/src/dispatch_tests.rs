// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ji_broker::{ConnectionRegistry, MemoryBroker};
use ji_core::{
    AgentConfig, BrokerConnectionConfig, BrokerKind, EventBus, IdentityId, JobData, JobStatus,
    ProjectData,
};

const SETTLE: Duration = Duration::from_millis(20);

fn config() -> AgentConfig {
    AgentConfig {
        broker_connection: Some(BrokerConnectionConfig::new(BrokerKind::Topic, "localhost", 4222)),
        project: ProjectData {
            uuid: Some("proj".to_string()),
            job_datas: vec![
                JobData { event: "build".to_string(), ..Default::default() },
                JobData { event: "slow".to_string(), ..Default::default() },
            ],
            ..Default::default()
        },
        jobs: vec![
            JobConfig::builder().name("build").event("build").cmd("echo {{task_id}}").build(),
            JobConfig::builder().name("slow").event("slow").cmd("sleep {{secs}}; echo {{task_id}}").build(),
            JobConfig::builder().name("orphan").event("other").cmd("echo never").build(),
        ],
        ..Default::default()
    }
}

struct Harness {
    broker: MemoryBroker,
    registry: ConnectionRegistry,
    bus: EventBus,
    dispatcher: JobDispatcher,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let broker = MemoryBroker::new("default");
        let registry = ConnectionRegistry::new();
        registry.register("default", Arc::new(broker.clone()));
        let bus = EventBus::new();
        let dir = tempfile::tempdir().unwrap();
        let ctx = AgentContext::new(config(), IdentityId::new("agent-1"), registry.clone(), bus.clone(), dir.path());
        let dispatcher = JobDispatcher::new(ctx, dir.path(), SETTLE);
        Self { broker, registry, bus, dispatcher, _dir: dir }
    }

    async fn wait_for(&self, what: &str, check: impl Fn() -> bool) {
        for _ in 0..300 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {what}");
    }
}

#[tokio::test]
async fn subscribes_only_active_jobs_in_the_project_group() {
    let h = Harness::new();
    assert_eq!(h.dispatcher.start().await.unwrap(), 2);

    assert_eq!(h.broker.subscription_count("proj.build"), 1);
    assert_eq!(h.broker.subscription_count("proj.slow"), 1);
    assert_eq!(h.broker.subscription_count("proj.other"), 0);
}

#[tokio::test]
async fn data_message_runs_the_job() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();

    h.broker.inject("proj.build", r#"{"task_id":"T1","data":{}}"#);
    h.wait_for("T1 finish", || !h.broker.published_to("T1_finish").is_empty()).await;

    assert_eq!(h.broker.published_to("T1_process"), vec!["T1\n"]);
    assert_eq!(h.broker.published_to("T1_finish"), vec!["finish"]);
    h.wait_for("running set cleared", || h.dispatcher.running().is_empty()).await;
}

#[tokio::test]
async fn cancellation_message_is_mirrored_without_spawning() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.bus.subscribe("T2_terminate", move |payload| sink.lock().push(payload.to_string()));

    h.broker.inject("proj.build", r#"{"task_id":"T2","action":"terminate"}"#);

    assert_eq!(seen.lock().len(), 1);
    assert!(h.dispatcher.running().is_empty());
    assert!(h.broker.published().is_empty());
}

#[tokio::test]
async fn cancellation_reaches_a_running_job() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();

    h.broker.inject("proj.slow", r#"{"task_id":"T3","data":{"secs":"30"}}"#);
    h.wait_for("T3 armed", || h.bus.listener_count("T3_timeout") == 1).await;
    h.broker.inject("proj.slow", r#"{"task_id":"T3","action":"timeout"}"#);

    h.wait_for("T3 finish", || !h.broker.published_to("T3_finish").is_empty()).await;
    assert_eq!(h.broker.published_to("T3_finish"), vec![JobStatus::Timeout.to_string()]);
}

#[tokio::test]
async fn repeated_resubscribe_keeps_one_handler() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();
    for _ in 0..3 {
        h.dispatcher.resubscribe().await.unwrap();
    }
    assert_eq!(h.broker.subscription_count("proj.build"), 1);

    h.broker.inject("proj.build", r#"{"task_id":"T4","data":{}}"#);
    h.wait_for("T4 finish", || !h.broker.published_to("T4_finish").is_empty()).await;
    assert_eq!(h.broker.published_to("T4_process"), vec!["T4\n"]);
}

#[tokio::test]
async fn refresh_notice_moves_subscriptions_to_the_new_connection() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();

    let replacement = MemoryBroker::new("default");
    h.registry.register("default", Arc::new(replacement.clone()));
    h.bus.publish(topic::REFRESH_NOTICE, "default");
    h.bus.publish(topic::REFRESH_NOTICE, "default");

    h.wait_for("resubscribed", || {
        replacement.subscription_count("proj.build") == 1 && h.broker.subscription_count("proj.build") == 0
    })
    .await;
    // Let the second refresh settle before checking for duplicates
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(replacement.subscription_count("proj.build"), 1);
}

#[tokio::test]
async fn refresh_for_another_key_is_ignored() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();
    let replacement = MemoryBroker::new("default");
    h.registry.register("default", Arc::new(replacement.clone()));

    h.bus.publish(topic::REFRESH_NOTICE, "telemetry");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(replacement.subscription_count("proj.build"), 0);
    assert_eq!(h.broker.subscription_count("proj.build"), 1);
}

#[tokio::test]
async fn duplicate_task_id_while_running_is_dropped() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();

    let payload = r#"{"task_id":"T5","data":{"secs":"0.3"}}"#;
    h.broker.inject("proj.slow", payload);
    h.broker.inject("proj.slow", payload);
    assert_eq!(h.dispatcher.running(), vec![TaskId::new("T5")]);

    h.wait_for("T5 finish", || !h.broker.published_to("T5_finish").is_empty()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.broker.published_to("T5_process"), vec!["T5\n"]);
    assert_eq!(h.broker.published_to("T5_finish").len(), 1);
}

#[tokio::test]
async fn missing_connection_is_reported() {
    let h = Harness::new();
    let ctx = AgentContext::new(config(), IdentityId::new("a"), ConnectionRegistry::new(), h.bus.clone(), ".");
    let dispatcher = JobDispatcher::new(ctx, ".", SETTLE);
    assert!(matches!(dispatcher.start().await, Err(JobError::NoConnection(key)) if key == "default"));
}

#[tokio::test]
async fn shutdown_drains_running_jobs_as_terminated() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();

    h.broker.inject("proj.slow", r#"{"task_id":"T6","data":{"secs":"30"}}"#);
    h.wait_for("T6 armed", || h.bus.listener_count("T6_terminate") == 1).await;

    assert!(h.dispatcher.shutdown(Duration::from_secs(5)).await);
    assert_eq!(h.broker.published_to("T6_finish"), vec!["terminate"]);
    assert_eq!(h.broker.subscription_count("proj.slow"), 0);

    // Nothing is listening any more
    assert_eq!(h.broker.inject("proj.build", r#"{"task_id":"T7","data":{}}"#), 0);
    assert_eq!(h.dispatcher.resubscribe().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_payload_is_dropped() {
    let h = Harness::new();
    h.dispatcher.start().await.unwrap();
    h.broker.inject("proj.build", "not json");
    assert!(h.dispatcher.running().is_empty());
    assert!(h.broker.published().is_empty());
}
