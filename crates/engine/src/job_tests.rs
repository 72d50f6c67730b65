// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ji_broker::MemoryBroker;
use serde_json::json;

const SETTLE: Duration = Duration::from_millis(20);

struct Harness {
    broker: MemoryBroker,
    bus: EventBus,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self { broker: MemoryBroker::new("default"), bus: EventBus::new(), dir: tempfile::tempdir().unwrap() }
    }

    fn runner(&self) -> JobRunner {
        JobRunner::new(Arc::new(self.broker.clone()), self.bus.clone(), "proj", self.dir.path())
            .with_settle_delay(SETTLE)
    }

    fn output(&self, topic: &str) -> String {
        self.broker.published_to(topic).concat()
    }

    /// Wait until the job has armed its cancellation listeners.
    async fn wait_armed(&self, task: &str) {
        let topic = format!("{task}_terminate");
        for _ in 0..200 {
            if self.bus.listener_count(&topic) == 1 && self.broker.subscription_count(&format!("{task}_worker")) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {task} never armed its cancellation listeners");
    }
}

fn job(cmd: &str) -> JobConfig {
    JobConfig::builder().cmd(cmd).build()
}

fn message(task: &str, data: serde_json::Value) -> JobMessage {
    JobMessage::new(TaskId::new(task), data)
}

#[tokio::test]
async fn echo_job_streams_output_then_finishes() {
    let h = Harness::new();
    let status =
        h.runner().run(&job("echo {{greeting}} {{task_id}}"), message("T1", json!({ "greeting": "hi" }))).await;

    assert_eq!(status, JobStatus::Finish);
    assert_eq!(h.output("T1_process"), "hi T1\n");
    assert!(h.broker.published_to("T1_failed").is_empty());
    assert_eq!(h.broker.published().last().unwrap(), &("T1_finish".to_string(), "finish".to_string()));
}

#[tokio::test]
async fn job_data_is_persisted_per_task() {
    let h = Harness::new();
    h.runner().run(&job("true"), message("T2", json!({ "foo": "bar" }))).await;

    let written = std::fs::read_to_string(h.dir.path().join("T2.json")).unwrap();
    let data: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(data, json!({ "foo": "bar" }));
}

#[yare::parameterized(
    stderr_output = { "echo oops >&2",              "oops\n" },
    nonzero_exit  = { "exit 4",                     "" },
    both          = { "echo late >&2; exit 1",      "late\n" },
)]
#[test_macro(tokio::test)]
async fn failures_finish_with_error(cmd: &str, failed: &str) {
    let h = Harness::new();
    let status = h.runner().run(&job(cmd), message("T3", json!({}))).await;

    assert_eq!(status, JobStatus::Error);
    assert_eq!(h.output("T3_failed"), failed);
    assert_eq!(h.broker.published_to("T3_finish"), vec!["error"]);
}

#[tokio::test]
async fn stderr_does_not_stop_the_process() {
    let h = Harness::new();
    let status = h.runner().run(&job("echo warn >&2; echo done"), message("T4", json!({}))).await;

    assert_eq!(status, JobStatus::Error);
    assert_eq!(h.output("T4_process"), "done\n");
}

#[tokio::test]
async fn terminate_on_bus_kills_the_job() {
    let h = Harness::new();
    let runner = h.runner();
    let run = tokio::spawn(async move { runner.run(&job("sleep 30"), message("T5", json!({}))).await });
    h.wait_armed("T5").await;

    assert_eq!(h.bus.publish("T5_terminate", ""), 1);
    let status = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();

    assert_eq!(status, JobStatus::Terminate);
    assert_eq!(h.broker.published_to("T5_finish"), vec!["terminate"]);
    // The unused one-shot listener is gone too
    assert_eq!(h.bus.listener_count("T5_timeout"), 0);
    assert_eq!(h.broker.subscription_count("T5_worker"), 0);
}

#[tokio::test]
async fn worker_topic_timeout_is_mirrored_onto_the_bus() {
    let h = Harness::new();
    let runner = h.runner();
    let run = tokio::spawn(async move { runner.run(&job("sleep 30"), message("T6", json!({}))).await });
    h.wait_armed("T6").await;

    h.broker.inject("T6_worker", r#"{"task_id":"T6","action":"timeout"}"#);
    let status = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();

    assert_eq!(status, JobStatus::Timeout);
    assert_eq!(h.broker.published_to("T6_finish"), vec!["timeout"]);
}

#[tokio::test]
async fn first_cancellation_sticks() {
    let h = Harness::new();
    let runner = h.runner();
    let run = tokio::spawn(async move { runner.run(&job("sleep 30"), message("T7", json!({}))).await });
    h.wait_armed("T7").await;

    h.bus.publish("T7_timeout", "");
    h.bus.publish("T7_terminate", "");
    let status = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert_eq!(status, JobStatus::Timeout);
}

#[tokio::test]
async fn malformed_template_abandons_without_spawning() {
    let h = Harness::new();
    let status = h.runner().run(&job("echo {{oops"), message("T8", json!({}))).await;

    assert_eq!(status, JobStatus::Error);
    assert_eq!(h.broker.topics(), vec!["T8_failed", "T8_finish"]);
    assert!(h.output("T8_failed").contains("malformed placeholder"));
    assert_eq!(h.bus.listener_count("T8_terminate"), 0);
}

#[tokio::test]
async fn every_output_chunk_precedes_finish() {
    let h = Harness::new();
    let status = h.runner().run(&job("seq 1 5000; seq 1 500 >&2"), message("T9", json!({}))).await;
    assert_eq!(status, JobStatus::Error);

    let topics = h.broker.topics();
    assert_eq!(topics.last().map(String::as_str), Some("T9_finish"));
    assert_eq!(topics.iter().filter(|t| *t == "T9_finish").count(), 1);

    let stdout = h.output("T9_process");
    assert_eq!(stdout.lines().count(), 5000);
    assert!(h.broker.published_to("T9_process").iter().all(|chunk| chunk.len() <= CHUNK_SIZE));
}

#[yare::parameterized(
    plain     = { "0192-abc_d",  "0192-abc_d.json" },
    traversal = { "../etc/pw",   "___etc_pw.json" },
    dotted    = { "a.b",         "a_b.json" },
)]
fn task_file_names(task: &str, expected: &str) {
    let dir = Path::new("/tasks");
    assert_eq!(task_file(dir, &TaskId::new(task)), dir.join(expected));
}

#[tokio::test]
async fn runner_shutdown_terminates_running_jobs() {
    let h = Harness::new();
    let shutdown = CancellationToken::new();
    let runner = h.runner().with_shutdown(shutdown.clone());
    let run = tokio::spawn(async move { runner.run(&job("sleep 30"), message("T10", json!({}))).await });
    h.wait_armed("T10").await;

    shutdown.cancel();
    let status = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert_eq!(status, JobStatus::Terminate);
    assert_eq!(h.broker.published_to("T10_finish"), vec!["terminate"]);
}
