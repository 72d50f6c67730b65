// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::connection::handler;
use std::sync::atomic::{AtomicUsize, Ordering};

fn counting() -> (Arc<AtomicUsize>, MessageHandler) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    (count, handler(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    }))
}

#[tokio::test]
async fn grouped_subscribers_share_one_delivery() {
    let broker = MemoryBroker::new("default");
    let (a, ha) = counting();
    let (b, hb) = counting();
    broker.subscribe_grouped("p.build", "p", ha).await.unwrap();
    broker.subscribe_grouped("p.build", "p", hb).await.unwrap();

    broker.publish("p.build", "{}").await;

    assert_eq!(a.load(Ordering::SeqCst) + b.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ungrouped_subscribers_all_receive() {
    let broker = MemoryBroker::new("default");
    let (a, ha) = counting();
    let (b, hb) = counting();
    broker.subscribe("id.shutdown", ha).await.unwrap();
    broker.subscribe("id.shutdown", hb).await.unwrap();

    broker.publish("id.shutdown", "").await;

    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_subscription_stops_delivery() {
    let broker = MemoryBroker::new("default");
    let (count, h) = counting();
    let sub = broker.subscribe("t", h).await.unwrap();
    sub.cancel();

    broker.publish("t", "x").await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(broker.subscription_count("t"), 0);
    assert_eq!(broker.published_to("t"), vec!["x".to_string()]);
}

#[tokio::test]
async fn sync_receive_returns_first_message_and_cleans_up() {
    let broker = MemoryBroker::new("default");
    let publisher = broker.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher.publish("ack", "ok").await;
    });

    let got = broker.subscribe_grouped_sync("ack", "g", Duration::from_secs(2)).await.unwrap();

    assert_eq!(got.into_message().as_deref(), Some("ok"));
    assert_eq!(broker.subscription_count("ack"), 0);
}

#[tokio::test]
async fn sync_receive_times_out_and_cleans_up() {
    let broker = MemoryBroker::new("default");
    let got = broker.subscribe_sync("silent", Duration::from_millis(30)).await.unwrap();
    assert!(got.timed_out());
    assert_eq!(broker.subscription_count("silent"), 0);
}

#[tokio::test]
async fn key_values_round_trip() {
    let broker = MemoryBroker::new("default");
    broker.set_key("k", "v", None).await.unwrap();
    assert_eq!(broker.get_key("k").await.unwrap().as_deref(), Some("v"));
    assert_eq!(broker.get_key("missing").await.unwrap(), None);
}
