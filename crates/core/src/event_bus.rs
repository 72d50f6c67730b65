// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local Event Bus: in-process publish/subscribe for intra-agent signals.
//!
//! Carries cancellation (`{task_id}_timeout`, `{task_id}_terminate`) and
//! connection refresh notices. Nothing published here leaves the process.
//!
//! Handlers run synchronously on the publishing task, outside the bus lock,
//! so a handler may publish or unsubscribe without deadlocking. Handlers must
//! not block; hand work off to a channel or spawned task instead.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Callback invoked with the payload of each delivered event.
pub type BusHandler = Arc<dyn Fn(&str) + Send + Sync>;

struct Listener {
    id: u64,
    once: bool,
    handler: BusHandler,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    topics: HashMap<String, Vec<Listener>>,
}

/// Handle returned by subscribe calls, used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusSubscription {
    topic: String,
    id: u64,
}

impl BusSubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Process-wide event bus. Clones share the same listener table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusState>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every event published on `topic` until unsubscribed.
    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: impl Fn(&str) + Send + Sync + 'static,
    ) -> BusSubscription {
        self.add(topic.into(), false, Arc::new(handler))
    }

    /// Deliver at most one event, then drop the listener.
    ///
    /// Removal happens under the bus lock, so concurrent publishers cannot
    /// both observe the same one-shot listener.
    pub fn subscribe_once(
        &self,
        topic: impl Into<String>,
        handler: impl Fn(&str) + Send + Sync + 'static,
    ) -> BusSubscription {
        self.add(topic.into(), true, Arc::new(handler))
    }

    /// Remove a listener. Returns false if it was already gone (fired once or
    /// unsubscribed before).
    pub fn unsubscribe(&self, sub: &BusSubscription) -> bool {
        let mut state = self.inner.lock();
        let Some(listeners) = state.topics.get_mut(&sub.topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| l.id != sub.id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            state.topics.remove(&sub.topic);
        }
        removed
    }

    /// Publish `payload` on `topic`. Returns the number of handlers invoked.
    pub fn publish(&self, topic: &str, payload: &str) -> usize {
        let handlers: Vec<BusHandler> = {
            let mut state = self.inner.lock();
            let Some(listeners) = state.topics.get_mut(topic) else {
                return 0;
            };
            let handlers = listeners.iter().map(|l| Arc::clone(&l.handler)).collect();
            listeners.retain(|l| !l.once);
            if listeners.is_empty() {
                state.topics.remove(topic);
            }
            handlers
        };
        tracing::trace!(topic, listeners = handlers.len(), "bus publish");
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner.lock().topics.get(topic).map_or(0, Vec::len)
    }

    fn add(&self, topic: String, once: bool, handler: BusHandler) -> BusSubscription {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.topics.entry(topic.clone()).or_default().push(Listener { id, once, handler });
        BusSubscription { topic, id }
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
