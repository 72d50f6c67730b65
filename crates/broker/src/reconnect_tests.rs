// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

#[tokio::test]
async fn retries_until_success() {
    let calls = AtomicUsize::new(0);
    let result: Result<u32, String> = retry_forever("test", Duration::from_millis(1), |_| false, || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 3 {
                Err("unreachable".to_string())
            } else {
                Ok(7)
            }
        }
    })
    .await;
    assert_eq!(result, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn fatal_errors_stop_retrying() {
    let calls = AtomicUsize::new(0);
    let result: Result<(), String> =
        retry_forever("test", Duration::from_millis(1), |e: &String| e == "fatal", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("fatal".to_string()) }
        })
        .await;
    assert_eq!(result, Err("fatal".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn recovery_announces_refresh_once() {
    let bus = EventBus::new();
    let refreshes = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&refreshes);
    bus.subscribe(topic::REFRESH_NOTICE, move |key: &str| {
        assert_eq!(key, "default");
        r.fetch_add(1, Ordering::SeqCst);
    });
    let link = LinkState::new("default", bus);

    assert!(link.lost());
    assert!(!link.lost());
    assert!(!link.is_connected());
    link.restored();
    link.restored();

    assert!(link.is_connected());
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

#[test]
fn restore_without_loss_is_silent() {
    let bus = EventBus::new();
    let link = LinkState::new("default", bus.clone());
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    bus.subscribe(topic::REFRESH_NOTICE, move |_: &str| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    link.restored();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
