// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::memory::MemoryBroker;

#[test]
fn unknown_key_resolves_to_none() {
    let registry = ConnectionRegistry::new();
    assert!(registry.get("default").is_none());
    assert!(registry.is_empty());
}

#[test]
fn register_then_get_returns_same_handle() {
    let registry = ConnectionRegistry::new();
    let broker: Arc<dyn BrokerConnection> = Arc::new(MemoryBroker::new("default"));
    registry.register("default", Arc::clone(&broker));

    let resolved = registry.get("default").unwrap();
    assert!(Arc::ptr_eq(&resolved, &broker));
}

#[test]
fn re_registering_replaces_the_active_handle() {
    let registry = ConnectionRegistry::new();
    let first: Arc<dyn BrokerConnection> = Arc::new(MemoryBroker::new("default"));
    let second: Arc<dyn BrokerConnection> = Arc::new(MemoryBroker::new("default"));

    assert!(registry.register("default", Arc::clone(&first)).is_none());
    let previous = registry.register("default", Arc::clone(&second)).unwrap();

    assert!(Arc::ptr_eq(&previous, &first));
    assert!(Arc::ptr_eq(&registry.get("default").unwrap(), &second));
    assert_eq!(registry.len(), 1);
}

#[test]
fn concurrent_registration_is_safe() {
    let registry = ConnectionRegistry::new();
    let threads: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let key = format!("k{i}");
                registry.register(key.clone(), Arc::new(MemoryBroker::new(&key)));
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(registry.keys().len(), 8);
}
